use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use varia_core::Artifact;
use varia_processing::ProcessingStage;

/// Number of times a stage ran.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub stage: String,
    pub input: Bytes,
}

/// Inputs seen by recording stages, in execution order.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub fn order(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.stage).collect()
    }

    pub fn input_of(&self, stage: &str) -> Option<Bytes> {
        self.entries()
            .into_iter()
            .find(|e| e.stage == stage)
            .map(|e| e.input)
    }
}

/// Appends `+{tag}` to the artifact bytes.
pub struct TagStage {
    tag: String,
    runs: Option<Counter>,
    journal: Option<Journal>,
}

impl TagStage {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            runs: None,
            journal: None,
        }
    }

    pub fn counted(mut self, counter: &Counter) -> Self {
        self.runs = Some(counter.clone());
        self
    }

    pub fn recorded(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }
}

#[async_trait]
impl ProcessingStage for TagStage {
    fn name(&self) -> &str {
        &self.tag
    }

    async fn apply(&self, input: Artifact) -> Result<Artifact, anyhow::Error> {
        if let Some(runs) = &self.runs {
            runs.0.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(journal) = &self.journal {
            journal.0.lock().unwrap().push(Entry {
                stage: self.tag.clone(),
                input: input.data.clone(),
            });
        }

        let mut data = input.data.to_vec();
        data.extend_from_slice(format!("+{}", self.tag).as_bytes());
        Ok(input.with_data(data))
    }
}
