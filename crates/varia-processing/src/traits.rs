//! Processing stage abstraction

use async_trait::async_trait;
use std::fmt;
use varia_core::Artifact;

/// One step of a version's processing pipeline.
///
/// Stages receive the artifact produced by the previous stage (or the
/// version's input for the first stage) and return a new artifact.
#[async_trait]
pub trait ProcessingStage: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Transform `input` into the next artifact
    async fn apply(&self, input: Artifact) -> Result<Artifact, anyhow::Error>;
}

type StageFn = dyn Fn(Artifact) -> Result<Artifact, anyhow::Error> + Send + Sync;

/// Stage backed by a synchronous closure.
///
/// Handy for hosts whose transformations are cheap byte manipulations, and
/// for tests.
pub struct FnStage {
    name: String,
    func: Box<StageFn>,
}

impl FnStage {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Artifact) -> Result<Artifact, anyhow::Error> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for FnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl ProcessingStage for FnStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Artifact) -> Result<Artifact, anyhow::Error> {
        (self.func)(input)
    }
}
