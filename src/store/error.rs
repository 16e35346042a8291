use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config '{0}' not found")]
    NotFound(String),

    #[error("config id '{0}' already exists")]
    DuplicateId(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("storage I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage file {path} is not a valid config document: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::DuplicateId(_) => "duplicate_id",
            StoreError::InvalidConfig(_) => "invalid_config",
            StoreError::Io { .. } | StoreError::Corrupt { .. } => "storage_io_error",
        }
    }

    /// Whether this points at the backing file rather than the caller.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, StoreError::Io { .. } | StoreError::Corrupt { .. })
    }
}
