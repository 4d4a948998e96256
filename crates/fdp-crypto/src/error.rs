use std::path::PathBuf;

use thiserror::Error;

/// Errors from hashing operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The file to hash does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Reading the file failed part way through.
    #[error("I/O error hashing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for hashing operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
