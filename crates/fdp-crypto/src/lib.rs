//! Content hashing for the FAIR data pipeline client.
//!
//! Registries store SHA-1 digests in `storage_location.hash`, so the digest
//! algorithm has to match bit for bit. All operations wrap the `sha1` crate.

pub mod error;
pub mod hasher;

pub use error::{CryptoError, CryptoResult};
pub use hasher::{ContentHasher, TOKEN_LEN};
