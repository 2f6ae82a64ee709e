//! Error types for the version engine.

use thiserror::Error;
use varia_core::{ErrorMetadata, LogLevel};
use varia_processing::ProcessingError;
use varia_storage::StorageError;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Version '{name}' is already declared with a conflicting definition: {reason}")]
    DuplicateVariant { name: String, reason: String },

    #[error("Invalid version name '{0}'")]
    InvalidVariantName(String),

    #[error("Version '{variant}' depends on '{depends_on}', which is not a sibling version")]
    MissingDependency { variant: String, depends_on: String },

    #[error("Version '{0}' is part of a dependency cycle")]
    DependencyCycle(String),

    #[error("Version {0} doesn't exist")]
    UnknownVariant(String),

    #[error("Unknown condition check '{0}'")]
    UnknownCondition(String),

    #[error("Invalid cache name: {0}")]
    InvalidCacheName(String),

    #[error("No file attached to {0}")]
    NoFile(String),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorMetadata for VersionError {
    fn error_code(&self) -> &'static str {
        match self {
            VersionError::DuplicateVariant { .. } => "DUPLICATE_VARIANT",
            VersionError::InvalidVariantName(_) => "INVALID_VARIANT_NAME",
            VersionError::MissingDependency { .. } => "MISSING_DEPENDENCY",
            VersionError::DependencyCycle(_) => "DEPENDENCY_CYCLE",
            VersionError::UnknownVariant(_) => "UNKNOWN_VARIANT",
            VersionError::UnknownCondition(_) => "UNKNOWN_CONDITION",
            VersionError::InvalidCacheName(_) => "INVALID_CACHE_NAME",
            VersionError::NoFile(_) => "NO_FILE",
            VersionError::Processing(_) => "PROCESSING_ERROR",
            VersionError::Storage(_) => "STORAGE_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, VersionError::Storage(_))
    }

    fn log_level(&self) -> LogLevel {
        match self {
            VersionError::UnknownVariant(_)
            | VersionError::InvalidCacheName(_)
            | VersionError::NoFile(_) => LogLevel::Debug,
            VersionError::DuplicateVariant { .. }
            | VersionError::InvalidVariantName(_)
            | VersionError::MissingDependency { .. }
            | VersionError::DependencyCycle(_)
            | VersionError::UnknownCondition(_) => LogLevel::Warn,
            VersionError::Processing(_) | VersionError::Storage(_) => LogLevel::Error,
        }
    }
}
