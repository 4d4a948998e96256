//! Foundation types for the FAIR data pipeline client.
//!
//! Every other `fdp-*` crate depends on `fdp-types`.
//!
//! # Key Types
//!
//! - [`RegistryObjectRef`] -- reference to a registry entity (`<root><table>/<id>/`)
//! - [`ContentDigest`] -- SHA-1 content digest used for content addressing
//! - [`Table`] -- the registry tables this client talks to
//! - [`validate_version`] -- `MAJOR.MINOR.PATCH` check for data product versions

pub mod digest;
pub mod error;
pub mod reference;
pub mod table;
pub mod version;

pub use digest::ContentDigest;
pub use error::TypeError;
pub use reference::RegistryObjectRef;
pub use table::Table;
pub use version::{validate_version, DEFAULT_VERSION};
