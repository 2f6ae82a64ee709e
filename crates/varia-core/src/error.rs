//! Error metadata shared by the engine's error types.
//!
//! Each crate owns its own `thiserror` enum. This module only defines how an
//! error describes itself so that callers can log and report it uniformly.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like unknown version names
    Debug,
    /// Warning level - for configuration mistakes surfaced at runtime
    Warn,
    /// Error level - for collaborator failures
    Error,
}

/// Self-description of an error for logging and reporting.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "MISSING_DEPENDENCY")
    fn error_code(&self) -> &'static str;

    /// Whether re-running the same operation may succeed
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Emit a `tracing` event for `err` at the level it asks for.
pub fn log_error<E>(err: &E, operation: &str)
where
    E: ErrorMetadata + std::fmt::Display,
{
    let code = err.error_code();
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(operation, code, error = %err, "Operation failed"),
        LogLevel::Warn => tracing::warn!(operation, code, error = %err, "Operation failed"),
        LogLevel::Error => tracing::error!(operation, code, error = %err, "Operation failed"),
    }
}
