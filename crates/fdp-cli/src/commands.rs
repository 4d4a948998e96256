use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use fdp_crypto::ContentHasher;
use fdp_registry::{ClientConfig, HttpTransport};
use fdp_sdk::{default_token_path, read_token, Config, RegistryLocation};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Validate(target) => cmd_validate(target, &cli.format),
        Command::Hash(args) => cmd_hash(args, &cli.format),
        Command::Run(args) => cmd_run(args, &cli.format),
    }
}

fn location(target: &RunTarget) -> RegistryLocation {
    if target.remote {
        RegistryLocation::Remote
    } else {
        RegistryLocation::Local
    }
}

fn cmd_validate(target: RunTarget, format: &OutputFormat) -> anyhow::Result<()> {
    let config = Config::validate(&target.config, &target.script, None, location(&target))?;
    let tree = config.tree();
    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "run_metadata": config.metadata(),
                "writes": tree.write_names(),
                "reads": tree.read_names(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let meta = config.metadata();
            println!("{} {} is valid", "✓".green().bold(), target.config.display().to_string().bold());
            println!("  Registry: {}", meta.registry_url.blue());
            println!("  Data store: {}", meta.write_data_store.display());
            println!(
                "  Namespaces: in {} / out {}",
                meta.default_input_namespace.yellow(),
                meta.default_output_namespace.yellow()
            );
            for name in tree.write_names() {
                println!("  {} {}", "write:".green(), name);
            }
            for name in tree.read_names() {
                println!("  {} {}", "read:".cyan(), name);
            }
        }
    }
    Ok(())
}

fn cmd_hash(args: HashArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let digest = ContentHasher::hash_file(&args.file)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({"file": args.file, "sha1": digest.to_hex()})
        ),
        OutputFormat::Text => println!("{}  {}", digest.to_hex().yellow(), args.file.display()),
    }
    Ok(())
}

fn cmd_run(args: RunArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let token_path = match args.token_file {
        Some(path) => path,
        None => default_token_path().context("cannot locate the home directory for the token file")?,
    };
    let token = read_token(&token_path)?;
    let target = &args.target;
    let mut config = Config::validate(&target.config, &target.script, Some(token), location(target))?;

    let client = ClientConfig::default().with_timeout_secs(args.timeout);
    config.initialise(Arc::new(HttpTransport::new(&client)))?;
    let reads = config.tree().read_names();
    for name in reads {
        let path = config
            .link_read(&name)
            .with_context(|| format!("resolving read {name}"))?;
        if matches!(format, OutputFormat::Text) {
            println!("  {} {} → {}", "read:".cyan(), name, path.display());
        }
    }
    config.finalise()?;

    let code_run = config.code_run().cloned().unwrap_or_default();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&code_run)?),
        OutputFormat::Text => {
            println!("{} Code run registered", "✓".green().bold());
            if let Some(url) = code_run.get("url").and_then(|u| u.as_str()) {
                println!("  Code run: {}", url.yellow());
            }
            if let Some(uuid) = config.code_run_uuid() {
                println!("  UUID: {}", uuid.dimmed());
            }
            println!("  Inputs: {}", config.inputs().len().to_string().bold());
        }
    }
    Ok(())
}
