//! Runtime version instances
//!
//! Instances live in the [`Uploader`](crate::Uploader) arena and refer to
//! each other by [`NodeId`]. The parent link is only used for lookups
//! (qualified names, setting resolution); the arena owns every node.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use crate::definition::VariantDefinition;
use crate::error::VersionError;

/// Index of an instance in its uploader's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The uploader instance itself
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Identifier grouping every file produced by one caching session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheId(Uuid);

impl CacheId {
    pub fn generate() -> Self {
        CacheId(Uuid::new_v4())
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for CacheId {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s)
            .map(CacheId)
            .map_err(|_| VersionError::InvalidCacheName(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VariantState {
    #[default]
    Empty,
    Cached,
    Stored,
    /// Loaded from the store without going through the cache
    Retrieved,
    Removed,
}

/// File handle held by an instance.
///
/// Bytes of retrieved files are loaded lazily, the first time a lifecycle
/// step needs them.
#[derive(Clone, Debug)]
pub struct VariantFile {
    pub key: String,
    pub location: String,
    /// Uploaded filename without the version prefix. Keys are built from it.
    pub original_filename: String,
    /// Name the pipeline gave the file; differs when a stage renames it
    pub filename: String,
    pub content_type: Option<String>,
    pub(crate) data: Option<Bytes>,
}

impl VariantFile {
    pub fn data(&self) -> Option<&Bytes> {
        self.data.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.data.is_some()
    }
}

#[derive(Debug)]
pub struct VariantInstance {
    pub(crate) name: Option<String>,
    pub(crate) definition: Arc<VariantDefinition>,
    pub(crate) parent: Option<NodeId>,
    /// Materialized versions, in definition order then dynamic order
    pub(crate) children: Option<Vec<(String, NodeId)>>,
    /// Definitions added to this instance only
    pub(crate) dynamic: Vec<Arc<VariantDefinition>>,
    pub(crate) file: Option<VariantFile>,
    pub(crate) cache_id: Option<CacheId>,
    /// Session in which `file` was produced by this instance's own cache step
    pub(crate) cached_in: Option<CacheId>,
    pub(crate) state: VariantState,
}

impl VariantInstance {
    pub(crate) fn new(
        name: Option<String>,
        definition: Arc<VariantDefinition>,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            name,
            definition,
            parent,
            children: None,
            dynamic: Vec::new(),
            file: None,
            cache_id: None,
            cached_in: None,
            state: VariantState::Empty,
        }
    }

    /// Unqualified version name, `None` for the uploader itself.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn definition(&self) -> &Arc<VariantDefinition> {
        &self.definition
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn file(&self) -> Option<&VariantFile> {
        self.file.as_ref()
    }

    pub fn cache_id(&self) -> Option<CacheId> {
        self.cache_id
    }

    pub fn state(&self) -> VariantState {
        self.state
    }

    pub fn is_cached(&self) -> bool {
        self.state == VariantState::Cached
    }

    /// `{cache_id}/{original_filename}` while the instance holds a cached file.
    pub fn cache_name(&self) -> Option<String> {
        match (&self.cache_id, &self.file, self.state) {
            (Some(cache_id), Some(file), VariantState::Cached) => Some(
                varia_storage::keys::cache_name(&cache_id.to_string(), &file.original_filename),
            ),
            _ => None,
        }
    }
}
