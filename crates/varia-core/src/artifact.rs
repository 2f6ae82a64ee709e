use bytes::Bytes;

use crate::filename::sanitize_filename;

/// An in-memory file flowing between processing stages and storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub data: Bytes,
    /// Sanitized base filename, without any version prefix.
    pub filename: String,
    pub content_type: Option<String>,
}

impl Artifact {
    /// Build an artifact, sanitizing `filename`.
    pub fn new(data: impl Into<Bytes>, filename: &str) -> Self {
        Self {
            data: data.into(),
            filename: sanitize_filename(filename),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Same filename and content type, different bytes.
    pub fn with_data(&self, data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lowercased extension of the filename, if any.
    pub fn extension(&self) -> Option<String> {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}
