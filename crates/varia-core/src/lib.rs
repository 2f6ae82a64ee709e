//! Varia Core Library
//!
//! This crate provides the shared building blocks of the version engine:
//! the artifact type passed between collaborators, configuration, error
//! metadata and the storage backend selector.

pub mod artifact;
pub mod config;
pub mod constants;
pub mod error;
pub mod filename;
pub mod storage_types;

// Re-export commonly used types
pub use artifact::Artifact;
pub use config::VariaConfig;
pub use error::{log_error, ErrorMetadata, LogLevel};
pub use filename::sanitize_filename;
pub use storage_types::StorageBackend;
