//! Location lookup through nested versions.

use std::collections::BTreeMap;

use crate::error::VersionError;
use crate::instance::NodeId;
use crate::tree::Uploader;

/// One argument of [`Uploader::resolve_location`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocationArg {
    /// Descend into the named version
    Variant(String),
    /// Query parameters appended to the final location
    Query(BTreeMap<String, String>),
}

impl From<&str> for LocationArg {
    fn from(name: &str) -> Self {
        LocationArg::Variant(name.to_string())
    }
}

impl From<String> for LocationArg {
    fn from(name: String) -> Self {
        LocationArg::Variant(name)
    }
}

impl From<BTreeMap<String, String>> for LocationArg {
    fn from(query: BTreeMap<String, String>) -> Self {
        LocationArg::Query(query)
    }
}

impl Uploader {
    /// Location of `id` or of one of its nested versions.
    ///
    /// `Variant` arguments walk down the tree in order, whether or not the
    /// versions are active. `Query` arguments may appear anywhere; their pairs
    /// are merged (later values win) and appended to the resolved location in
    /// key order. Returns `None` when the resolved instance holds no file.
    pub fn resolve_location(
        &mut self,
        id: NodeId,
        args: &[LocationArg],
    ) -> Result<Option<String>, VersionError> {
        let mut target = id;
        let mut query = BTreeMap::new();
        for arg in args {
            match arg {
                LocationArg::Variant(name) => target = self.variant(target, name)?,
                LocationArg::Query(pairs) => {
                    query.extend(pairs.iter().map(|(k, v)| (k.clone(), v.clone())))
                }
            }
        }
        Ok(self.base_location(target, &query))
    }

    /// Dotted form of [`resolve_location`](Self::resolve_location):
    /// `"thumb.small"` resolves the `small` version of `thumb`.
    pub fn resolve_path(&mut self, id: NodeId, path: &str) -> Result<Option<String>, VersionError> {
        let args: Vec<LocationArg> = path
            .split('.')
            .filter(|s| !s.is_empty())
            .map(LocationArg::from)
            .collect();
        self.resolve_location(id, &args)
    }

    /// Location of the file held by `id`, without query.
    pub fn location(&self, id: NodeId) -> Option<&str> {
        self.node(id).file().map(|f| f.location.as_str())
    }

    fn base_location(&self, id: NodeId, query: &BTreeMap<String, String>) -> Option<String> {
        let location = self.location(id)?;
        if query.is_empty() {
            return Some(location.to_string());
        }

        let encoded = query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if location.contains('?') { '&' } else { '?' };
        Some(format!("{}{}{}", location, separator, encoded))
    }
}
