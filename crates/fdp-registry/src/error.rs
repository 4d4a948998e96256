use std::path::PathBuf;

use fdp_types::TypeError;
use thiserror::Error;

use crate::transport::Method;

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No response was received.
    #[error("registry unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// The registry answered with a status other than the expected one.
    #[error("{method} {url} returned {actual}, expected {expected}: {body}")]
    UnexpectedStatus {
        method: Method,
        url: String,
        expected: u16,
        actual: u16,
        body: String,
    },

    /// The response body is not the JSON shape the call expects.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// A POST reported a conflict but no matching entity could be fetched.
    #[error("{table} reported a conflict but no existing entity matches the payload")]
    ConflictUnresolved { table: String },

    /// A download did not leave the expected file behind.
    #[error("download of {url} to {} failed: {reason}", path.display())]
    DownloadFailed {
        url: String,
        path: PathBuf,
        reason: String,
    },

    /// The API root is not an http(s) URL.
    #[error("invalid registry root {0:?}")]
    InvalidRoot(String),

    #[error("invalid registry reference: {0}")]
    Reference(#[from] TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
