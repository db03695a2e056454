//! # Object Store
//!
//! Byte-level access to objects grouped in buckets.

use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::api::ConnectorError;

/// Result type for object store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<StoreError> for ConnectorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectNotFound(key) => ConnectorError::TableNotFound(key),
            StoreError::InvalidPath(path) => {
                ConnectorError::invalid_request(format!("invalid object key: {}", path))
            }
            StoreError::IoError(reason) => ConnectorError::backend(reason),
        }
    }
}

/// Backend trait for object access
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Read the whole object
    fn read(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Check if the object exists
    fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool>;
}

/// Objects as files under `root/bucket/key`; an empty bucket names the root
#[derive(Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn bucket_path(&self, bucket: &str) -> StoreResult<PathBuf> {
        Ok(self.root.join(relative(bucket)?))
    }

    fn full_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        if key.is_empty() {
            return Err(StoreError::InvalidPath(key.to_string()));
        }
        Ok(self.bucket_path(bucket)?.join(relative(key)?))
    }
}

/// Rejects absolute paths and parent components
fn relative(path: &str) -> StoreResult<&Path> {
    let candidate = Path::new(path);
    let escapes = candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(candidate)
}

impl ObjectStore for LocalObjectStore {
    fn read(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let full_path = self.full_path(bucket, key)?;
        if full_path.is_dir() {
            return Err(StoreError::ObjectNotFound(key.to_string()));
        }

        fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::ObjectNotFound(key.to_string())
            } else {
                StoreError::IoError(e.to_string())
            }
        })
    }

    fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self.full_path(bucket, key)?.is_file())
    }
}
