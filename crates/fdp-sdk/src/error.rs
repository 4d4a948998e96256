use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::RunPhase;

/// Registry entities a lookup can fail to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    User,
    Author,
    Namespace,
    DataProduct,
    Object,
    ObjectComponent,
    StorageLocation,
    StorageRoot,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Author => "author",
            Self::Namespace => "namespace",
            Self::DataProduct => "data product",
            Self::Object => "object",
            Self::ObjectComponent => "object component",
            Self::StorageLocation => "storage location",
            Self::StorageRoot => "storage root",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SdkError {
    /// Malformed or incomplete run configuration.
    #[error("configuration error: {0}")]
    ConfigParsing(String),

    #[error("{entity} not found: {detail}")]
    EntityNotFound { entity: Entity, detail: String },

    /// A local file the run depends on is absent: a linked write that was
    /// never populated, or the submission script.
    #[error("file not found for {name}: {}", path.display())]
    FileNotFound { name: String, path: PathBuf },

    #[error("cannot {operation} while the run is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: RunPhase,
    },

    #[error("validation error: {0}")]
    Validation(#[from] fdp_types::TypeError),

    #[error("registry error: {0}")]
    Registry(#[from] fdp_registry::RegistryError),

    #[error("hashing error: {0}")]
    Crypto(#[from] fdp_crypto::CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SdkError {
    pub(crate) fn missing_key(key: &str) -> Self {
        Self::ConfigParsing(format!("missing key `{key}`"))
    }

    pub(crate) fn not_found(entity: Entity, detail: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity,
            detail: detail.into(),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
