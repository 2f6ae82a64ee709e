//! Processing pipeline for chaining version stages

use crate::error::ProcessingError;
use crate::traits::ProcessingStage;
use std::fmt;
use std::sync::Arc;
use varia_core::Artifact;

/// Ordered list of processing stages.
///
/// Cloning is cheap: stages are shared, so a pipeline can be reused by every
/// instance of the definition that owns it.
#[derive(Clone, Default)]
pub struct ProcessingPipeline {
    stages: Vec<Arc<dyn ProcessingStage>>,
}

impl ProcessingPipeline {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage
    pub fn add_stage(&mut self, stage: Arc<dyn ProcessingStage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order. An empty pipeline returns the input unchanged.
    pub async fn execute(&self, input: Artifact) -> Result<Artifact, ProcessingError> {
        let mut current = input;

        for stage in &self.stages {
            let size_before = current.len();
            current = stage
                .apply(current)
                .await
                .map_err(|source| ProcessingError::StageFailed {
                    stage: stage.name().to_string(),
                    source,
                })?;
            tracing::debug!(
                stage = stage.name(),
                size_before,
                size_after = current.len(),
                "Processing stage applied"
            );
        }

        Ok(current)
    }
}

impl fmt::Debug for ProcessingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}
