//! FAIR data pipeline SDK.
//!
//! [`Config`] drives one code run against a data registry:
//!
//! 1. [`Config::validate`] parses the run configuration and checks every
//!    mandatory key without touching the network.
//! 2. [`Config::initialise`] registers the config file, submission script and
//!    code repository, and creates the `code_run` record.
//! 3. [`Config::link_read`] / [`Config::link_write`] map logical data product
//!    names to local files.
//! 4. [`Config::finalise`] content-addresses every written file, registers
//!    the outputs and attaches inputs and outputs to the code run.

pub mod config;
pub mod error;
mod finalise;
mod lookup;
pub mod io_object;
pub mod metadata;
pub mod paths;
pub mod token;

pub use config::{Config, RunPhase};
pub use error::{Entity, SdkError, SdkResult};
pub use io_object::IoObject;
pub use metadata::{ConfigTree, ReadEntry, RegistryLocation, ResolvedUse, RunMetadata, UseBlock, WriteEntry};
pub use token::{default_token_path, read_token};

// Re-export key types
pub use fdp_crypto::ContentHasher;
pub use fdp_registry::{ClientConfig, HttpTransport, InMemoryRegistry, RegistryClient, RegistryTransport};
pub use fdp_types::{ContentDigest, RegistryObjectRef, Table};
