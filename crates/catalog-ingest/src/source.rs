//! Where the CSV export comes from

use async_trait::async_trait;
use catalog_common::CatalogError;
use std::path::PathBuf;
use tracing::info;

use crate::storage::{config::StorageConfig, Storage};

/// Provider of the raw CSV bytes for one run
#[async_trait]
pub trait CsvSource: Send + Sync {
    /// Fetch the whole export
    async fn fetch(&self) -> Result<Vec<u8>, CatalogError>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Export stored as one object in an S3-compatible bucket
pub struct S3Source {
    storage: Storage,
    key: String,
}

impl S3Source {
    pub fn new(config: StorageConfig, key: impl Into<String>) -> Self {
        Self {
            storage: Storage::new(config),
            key: key.into(),
        }
    }
}

#[async_trait]
impl CsvSource for S3Source {
    async fn fetch(&self) -> Result<Vec<u8>, CatalogError> {
        self.storage.download(&self.key).await
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.storage.bucket(), self.key)
    }
}

/// Export already on local disk
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CsvSource for LocalFileSource {
    async fn fetch(&self) -> Result<Vec<u8>, CatalogError> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CatalogError::Source(format!("{} does not exist", self.path.display()))
            },
            _ => CatalogError::Source(format!("{}: {}", self.path.display(), e)),
        })?;
        info!(path = %self.path.display(), bytes = data.len(), "Read local export");
        Ok(data)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
