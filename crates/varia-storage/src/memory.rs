use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use varia_core::Artifact;

/// In-memory storage, keyed exactly like the on-disk layout.
///
/// Clones share the same underlying map, so a test can keep a handle and
/// inspect what the engine wrote.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    files: Arc<RwLock<BTreeMap<String, Bytes>>>,
    base_url: String,
}

impl MemoryStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            files: Arc::new(RwLock::new(BTreeMap::new())),
            base_url: base_url.into(),
        }
    }

    /// All keys currently held, in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn store(&self, key: &str, artifact: &Artifact) -> StorageResult<String> {
        validate_key(key)?;
        self.files
            .write()
            .await
            .insert(key.to_string(), artifact.data.clone());
        tracing::debug!(key = %key, size_bytes = artifact.len(), "Memory storage write");
        Ok(self.location(key))
    }

    async fn retrieve(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.files
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.files.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.files.read().await.contains_key(key))
    }

    fn location(&self, key: &str) -> String {
        if self.base_url.is_empty() {
            format!("/{}", key)
        } else {
            format!("{}/{}", self.base_url.trim_end_matches('/'), key)
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
