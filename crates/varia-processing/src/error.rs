use thiserror::Error;

/// Errors raised while running a processing pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Processing stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: anyhow::Error,
    },
}
