//! Varia Storage Library
//!
//! This crate provides the storage abstraction used by the version engine and
//! two implementations: local filesystem and in-memory.
//!
//! # Storage key format
//!
//! Keys are relative, `/`-separated paths. Cached files live under
//! `{cache_dir}/{cache_id}/{full_filename}` and stored files under
//! `{store_dir}/{full_filename}`, where `full_filename` carries the version
//! prefix (`thumb_small_photo.jpg`). Key generation is centralized in the
//! `keys` module so every backend sees the same layout.
//!
//! Keys must not contain `..` or a leading `/`.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-memory")]
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-memory")]
pub use memory::MemoryStorage;
pub use traits::{Storage, StorageError, StorageResult};
pub use varia_core::StorageBackend;
