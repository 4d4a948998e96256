//! Registry client for the FAIR data pipeline.
//!
//! Translates typed registry operations into REST calls against a data
//! registry and hands back JSON entities.
//!
//! # Layers
//!
//! - [`RegistryTransport`] -- moves one request/response pair or one file download
//!   - [`HttpTransport`] -- blocking `ureq` agent with an explicit request timeout
//!   - [`InMemoryRegistry`] -- in-process registry for tests and embedding
//! - [`RegistryClient`] -- URL building, query encoding, status checks, and
//!   create-or-fetch: a `409 Conflict` on POST is answered by querying for the
//!   existing entity and returning it.
//!
//! Write operations are never retried. A transport failure surfaces as an
//! error to the caller immediately.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod query;
pub mod transport;

pub use client::{RegistryClient, STATUS_CONFLICT, STATUS_CREATED, STATUS_OK};
pub use config::ClientConfig;
pub use error::{RegistryError, RegistryResult};
pub use http::HttpTransport;
pub use memory::InMemoryRegistry;
pub use query::QueryEncoder;
pub use transport::{Method, RegistryRequest, RegistryResponse, RegistryTransport};
