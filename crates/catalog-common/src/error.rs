//! Error types for the catalog loader

use thiserror::Error;

/// Result type alias for stage-level operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Loader stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Fetch,
    SchemaReset,
    Load,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Config => write!(f, "config"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::SchemaReset => write!(f, "schema-reset"),
            Stage::Load => write!(f, "load"),
        }
    }
}

/// Main error type for a loader run
///
/// Each stage converts its own internal errors into one of these at its
/// boundary, so the caller only has to decide whether to continue.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File {key} not found in bucket {bucket}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("Access denied to bucket {0}")]
    AccessDenied(String),

    #[error("Failed to connect to object storage: {0}")]
    StorageConnection(String),

    #[error("Failed to read source data: {0}")]
    Source(String),

    #[error("Schema reset failed: {0}")]
    SchemaReset(String),

    #[error("Load failed: {0}")]
    Load(String),
}

impl CatalogError {
    /// Stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            CatalogError::Config(_) => Stage::Config,
            CatalogError::ObjectNotFound { .. }
            | CatalogError::BucketNotFound(_)
            | CatalogError::AccessDenied(_)
            | CatalogError::StorageConnection(_)
            | CatalogError::Source(_) => Stage::Fetch,
            CatalogError::SchemaReset(_) => Stage::SchemaReset,
            CatalogError::Load(_) => Stage::Load,
        }
    }

    /// True for the "not found" family of fetch failures
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::ObjectNotFound { .. } | CatalogError::BucketNotFound(_)
        )
    }
}
