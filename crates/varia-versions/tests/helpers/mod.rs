//! Test helpers: memory-backed uploaders, tagging stages and a switchable host.
//!
//! Run from workspace root: `cargo test -p varia-versions`.
#![allow(dead_code)]

pub mod host;
pub mod stages;

use std::sync::Arc;

use varia_core::{Artifact, VariaConfig};
use varia_storage::MemoryStorage;
use varia_versions::{DefinitionRegistry, Uploader};

use host::TestHost;

pub const BASE_URL: &str = "http://cdn.test";

/// Default store directory for the test host's record.
pub const STORE_DIR: &str = "uploads/user/avatar/1";

pub fn memory_storage() -> MemoryStorage {
    MemoryStorage::new(BASE_URL)
}

/// Uploader over a shared memory storage, with default configuration.
pub fn uploader(
    registry: &Arc<DefinitionRegistry>,
    storage: &MemoryStorage,
    host: &Arc<TestHost>,
) -> Uploader {
    uploader_with_config(registry, storage, host, VariaConfig::default())
}

pub fn uploader_with_config(
    registry: &Arc<DefinitionRegistry>,
    storage: &MemoryStorage,
    host: &Arc<TestHost>,
    config: VariaConfig,
) -> Uploader {
    Uploader::new(
        Arc::clone(registry),
        Arc::new(storage.clone()),
        host.clone(),
        Arc::new(config),
    )
}

pub fn photo() -> Artifact {
    Artifact::new(&b"img"[..], "photo.png").with_content_type("image/png")
}

pub fn stored_key(full_filename: &str) -> String {
    format!("{}/{}", STORE_DIR, full_filename)
}
