use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fdp",
    about = "FAIR data pipeline: register code runs and their data with a data registry",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a run configuration without contacting the registry
    Validate(RunTarget),
    /// Print the content digest of a file
    Hash(HashArgs),
    /// Register a code run, resolve its reads and finalise it
    Run(RunArgs),
}

/// Configuration and submission script of a run.
#[derive(Args)]
pub struct RunTarget {
    /// Run configuration (YAML)
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,
    /// Submission script recorded with the run
    #[arg(short, long)]
    pub script: PathBuf,
    /// Use `remote_data_registry_url` instead of the local registry
    #[arg(long)]
    pub remote: bool,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: RunTarget,
    /// Registry token file [default: ~/.fair/registry/token]
    #[arg(long)]
    pub token_file: Option<PathBuf>,
    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}
