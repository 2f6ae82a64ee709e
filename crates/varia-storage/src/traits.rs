//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use varia_core::Artifact;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store failed: {0}")]
    StoreFailed(String),

    #[error("Retrieve failed: {0}")]
    RetrieveFailed(String),

    #[error("Remove failed: {0}")]
    RemoveFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// The version engine only ever addresses files by key; it never touches the
/// filesystem directly. See the crate root documentation for the key layout.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write an artifact under `key` and return its public location.
    ///
    /// Existing content under the same key is replaced.
    async fn store(&self, key: &str, artifact: &Artifact) -> StorageResult<String>;

    /// Read the bytes stored under `key`.
    async fn retrieve(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete `key`. Removing a key that does not exist succeeds.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if a file exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Public location of `key`, whether or not it exists yet.
    fn location(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject keys that could escape the storage root.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains invalid characters: {}",
            key
        )));
    }
    Ok(())
}
