//! Lifecycle driver
//!
//! Each transition runs the node's own step first and then propagates to its
//! versions: cache and store only reach active versions, remove and the two
//! retrieve paths reach every version. Recursion over the arena goes through
//! boxed futures.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use varia_core::{log_error, sanitize_filename, Artifact};
use varia_storage::keys;

use crate::error::VersionError;
use crate::instance::{CacheId, NodeId, VariantFile, VariantState};
use crate::tree::Uploader;

impl Uploader {
    /// Cache `file` on the uploader and derive every active version from it.
    ///
    /// Each call opens a new caching session with a fresh [`CacheId`].
    pub async fn cache(&mut self, file: Artifact) -> Result<(), VersionError> {
        let session = CacheId::generate();
        let original = file.filename.clone();
        self.cache_node(NodeId::ROOT, file, original, session, true)
            .await
            .map_err(|e| report(e, "cache"))
    }

    /// Move cached files into the store.
    ///
    /// A `new_file` replaces whatever the uploader holds: it is cached in a
    /// fresh session first. Versions not cached in their parent's session are
    /// cached from `new_file` too.
    pub async fn store(&mut self, new_file: Option<Artifact>) -> Result<(), VersionError> {
        self.store_node(NodeId::ROOT, new_file, None)
            .await
            .map_err(|e| report(e, "store"))
    }

    /// Delete the uploader's file and the files of every version, active or not.
    pub async fn remove(&mut self) -> Result<(), VersionError> {
        self.remove_node(NodeId::ROOT)
            .await
            .map_err(|e| report(e, "remove"))
    }

    /// Re-attach to a caching session from its cache name
    /// (`{cache_id}/{original_filename}`). Files are loaded on first use.
    pub fn retrieve_from_cache(&mut self, cache_name: &str) -> Result<(), VersionError> {
        parse_cache_name(cache_name)
            .and_then(|(cache_id, original)| {
                self.retrieve_cached_node(NodeId::ROOT, cache_id, &original)
            })
            .map_err(|e| report(e, "retrieve_from_cache"))
    }

    /// Attach stored files by their original filename. Files are loaded on
    /// first use.
    pub fn retrieve_from_store(&mut self, identifier: &str) -> Result<(), VersionError> {
        self.retrieve_stored_node(NodeId::ROOT, identifier)
            .map_err(|e| report(e, "retrieve_from_store"))
    }

    /// Rebuild versions from the uploader's current file.
    ///
    /// With no names every version is re-cached and stored again. With names,
    /// only those active versions (and the siblings they depend on) are
    /// re-cached from the uploader's current file, and only the named ones are
    /// stored; the uploader itself is left as it is.
    pub async fn recreate(&mut self, names: &[&str]) -> Result<(), VersionError> {
        self.recreate_versions(names)
            .await
            .map_err(|e| report(e, "recreate"))
    }

    /// Bytes of the file held by `id`, loading them from storage if needed.
    pub async fn read(&mut self, id: NodeId) -> Result<Bytes, VersionError> {
        self.load_data(id).await.map_err(|e| report(e, "read"))
    }

    /// Cache the active versions of `id` from its cached file, in the
    /// session `id` was cached in.
    pub async fn after_cache(&mut self, id: NodeId) -> Result<(), VersionError> {
        let session = self.nodes[id.0]
            .cache_id
            .ok_or_else(|| VersionError::NoFile(self.describe(id)))?;
        self.propagate_cache(id, session).await
    }

    /// Store the active versions of `id`, or exactly `selected` among them.
    pub async fn after_store(
        &mut self,
        id: NodeId,
        new_file: Option<Artifact>,
        selected: Option<&[&str]>,
    ) -> Result<(), VersionError> {
        let selected = selected.map(|names| names.iter().map(|n| n.to_string()).collect());
        let session = self.nodes[id.0].cached_in;
        self.propagate_store(id, new_file, selected, session).await
    }

    pub async fn after_remove(&mut self, id: NodeId) -> Result<(), VersionError> {
        self.propagate_remove(id).await
    }

    pub fn after_retrieve_from_cache(
        &mut self,
        id: NodeId,
        cache_name: &str,
    ) -> Result<(), VersionError> {
        let (cache_id, original) = parse_cache_name(cache_name)?;
        for (_, child) in self.variants(id)? {
            self.retrieve_cached_node(child, cache_id, &original)?;
        }
        Ok(())
    }

    pub fn after_retrieve_from_store(
        &mut self,
        id: NodeId,
        identifier: &str,
    ) -> Result<(), VersionError> {
        for (_, child) in self.variants(id)? {
            self.retrieve_stored_node(child, identifier)?;
        }
        Ok(())
    }

    fn cache_node(
        &mut self,
        id: NodeId,
        input: Artifact,
        original: String,
        session: CacheId,
        process: bool,
    ) -> BoxFuture<'_, Result<(), VersionError>> {
        async move {
            self.base_cache(id, input, original, session, process).await?;
            self.propagate_cache(id, session).await
        }
        .boxed()
    }

    async fn base_cache(
        &mut self,
        id: NodeId,
        input: Artifact,
        original: String,
        session: CacheId,
        process: bool,
    ) -> Result<(), VersionError> {
        let definition = Arc::clone(&self.nodes[id.0].definition);
        let output = if process && self.enable_processing(id) {
            definition.pipeline().execute(input).await?
        } else {
            input
        };

        let key = self.cache_key(id, session, &original);
        let location = self.storage.store(&key, &output).await?;
        tracing::debug!(
            variant = %self.describe(id),
            path = %key,
            cache_id = %session,
            size = output.len(),
            "Version cached"
        );

        let node = self.node_mut(id);
        node.file = Some(VariantFile {
            key,
            location,
            original_filename: original,
            filename: output.filename,
            content_type: output.content_type,
            data: Some(output.data),
        });
        node.cache_id = Some(session);
        node.cached_in = Some(session);
        node.state = VariantState::Cached;
        Ok(())
    }

    fn propagate_cache(&mut self, id: NodeId, session: CacheId) -> BoxFuture<'_, Result<(), VersionError>> {
        async move {
            let active = self.active_variants(id)?;
            if active.is_empty() {
                return Ok(());
            }
            for (_, child) in &active {
                self.node_mut(*child).cache_id = Some(session);
            }

            let processed_parent = self.processed_artifact(id).await?;
            let mut in_progress = Vec::new();
            for (_, child) in active {
                self.cache_child(id, child, &processed_parent, session, &mut in_progress)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Cache one version of `parent`, caching the sibling it depends on first.
    fn cache_child<'a>(
        &'a mut self,
        parent: NodeId,
        child: NodeId,
        processed_parent: &'a Artifact,
        session: CacheId,
        in_progress: &'a mut Vec<NodeId>,
    ) -> BoxFuture<'a, Result<(), VersionError>> {
        async move {
            if self.nodes[child.0].cached_in == Some(session) {
                tracing::debug!(
                    variant = %self.describe(child),
                    cache_id = %session,
                    "Version already cached in this session"
                );
                return Ok(());
            }
            if in_progress.contains(&child) {
                return Err(VersionError::DependencyCycle(self.describe(child)));
            }

            let depends_on = self.nodes[child.0].definition.options().depends_on.clone();
            let input = match depends_on {
                Some(depends_on) => {
                    let sibling = match self.variant(parent, &depends_on) {
                        Ok(sibling) => sibling,
                        Err(VersionError::UnknownVariant(_)) => {
                            return Err(VersionError::MissingDependency {
                                variant: self.describe(child),
                                depends_on,
                            });
                        }
                        Err(err) => return Err(err),
                    };

                    in_progress.push(child);
                    self.cache_child(parent, sibling, processed_parent, session, in_progress)
                        .await?;
                    in_progress.pop();
                    self.processed_artifact(sibling).await?
                }
                None => processed_parent.clone(),
            };

            let original = self.original_for(child, &input);
            self.cache_node(child, input, original, session, true).await
        }
        .boxed()
    }

    /// `parent_session` is the session the parent was cached in before it
    /// was stored, `None` for the uploader itself.
    fn store_node(
        &mut self,
        id: NodeId,
        new_file: Option<Artifact>,
        parent_session: Option<CacheId>,
    ) -> BoxFuture<'_, Result<(), VersionError>> {
        async move {
            let session = self.base_store(id, new_file.clone(), parent_session).await?;
            self.propagate_store(id, new_file, None, session).await
        }
        .boxed()
    }

    /// Returns the session the node was cached in before being stored.
    async fn base_store(
        &mut self,
        id: NodeId,
        new_file: Option<Artifact>,
        parent_session: Option<CacheId>,
    ) -> Result<Option<CacheId>, VersionError> {
        let node = &self.nodes[id.0];
        let stale = parent_session.is_none() || node.cached_in != parent_session;
        let empty = matches!(node.state, VariantState::Empty | VariantState::Removed);
        match new_file {
            Some(file) if stale => {
                let session = parent_session.unwrap_or_else(CacheId::generate);
                let original = self.original_for(id, &file);
                self.cache_node(id, file, original, session, true).await?;
            }
            None if empty => {
                tracing::debug!(variant = %self.describe(id), "Nothing to store");
                return Ok(None);
            }
            _ => {}
        }

        let session = self.nodes[id.0].cached_in;
        match self.nodes[id.0].state {
            VariantState::Cached | VariantState::Retrieved => self.persist(id).await?,
            _ => tracing::debug!(variant = %self.describe(id), "Version already stored"),
        }
        Ok(session)
    }

    async fn persist(&mut self, id: NodeId) -> Result<(), VersionError> {
        let data = self.load_data(id).await?;
        let node = &self.nodes[id.0];
        let state = node.state;
        let file = node
            .file
            .clone()
            .ok_or_else(|| VersionError::NoFile(self.describe(id)))?;

        let key = self.store_key(id, &file.original_filename);
        let location = if state == VariantState::Retrieved && file.key == key {
            file.location.clone()
        } else {
            let artifact = Artifact {
                data: data.clone(),
                filename: file.filename.clone(),
                content_type: file.content_type.clone(),
            };
            self.storage.store(&key, &artifact).await?
        };

        if state == VariantState::Cached && self.config.delete_cache_after_store && file.key != key {
            self.storage.remove(&file.key).await?;
        }

        tracing::info!(
            variant = %self.describe(id),
            path = %key,
            size = data.len(),
            "Version stored"
        );

        let node = self.node_mut(id);
        node.file = Some(VariantFile {
            key,
            location,
            data: Some(data),
            ..file
        });
        node.cache_id = None;
        node.cached_in = None;
        node.state = VariantState::Stored;
        Ok(())
    }

    fn propagate_store(
        &mut self,
        id: NodeId,
        new_file: Option<Artifact>,
        selected: Option<Vec<String>>,
        session: Option<CacheId>,
    ) -> BoxFuture<'_, Result<(), VersionError>> {
        async move {
            let active = self.active_variants(id)?;
            let targets = match selected {
                Some(names) => select(&active, &names)?,
                None => active.into_iter().map(|(_, child)| child).collect(),
            };

            for child in targets {
                self.store_node(child, new_file.clone(), session).await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn remove_node(&mut self, id: NodeId) -> BoxFuture<'_, Result<(), VersionError>> {
        async move {
            self.base_remove(id).await?;
            self.propagate_remove(id).await
        }
        .boxed()
    }

    async fn base_remove(&mut self, id: NodeId) -> Result<(), VersionError> {
        let Some(key) = self.nodes[id.0].file.as_ref().map(|f| f.key.clone()) else {
            return Ok(());
        };

        self.storage.remove(&key).await?;
        tracing::info!(variant = %self.describe(id), path = %key, "Version removed");

        let node = self.node_mut(id);
        node.file = None;
        node.cache_id = None;
        node.cached_in = None;
        node.state = VariantState::Removed;
        Ok(())
    }

    fn propagate_remove(&mut self, id: NodeId) -> BoxFuture<'_, Result<(), VersionError>> {
        async move {
            for (_, child) in self.variants(id)? {
                self.remove_node(child).await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn retrieve_cached_node(
        &mut self,
        id: NodeId,
        cache_id: CacheId,
        original: &str,
    ) -> Result<(), VersionError> {
        let key = self.cache_key(id, cache_id, original);
        self.attach(id, key, original, VariantState::Cached, Some(cache_id));
        for (_, child) in self.variants(id)? {
            self.retrieve_cached_node(child, cache_id, original)?;
        }
        Ok(())
    }

    fn retrieve_stored_node(&mut self, id: NodeId, identifier: &str) -> Result<(), VersionError> {
        let key = self.store_key(id, identifier);
        self.attach(id, key, identifier, VariantState::Retrieved, None);
        self.after_retrieve_from_store(id, identifier)
    }

    fn attach(
        &mut self,
        id: NodeId,
        key: String,
        original: &str,
        state: VariantState,
        cache_id: Option<CacheId>,
    ) {
        let location = self.storage.location(&key);
        tracing::debug!(variant = %self.describe(id), path = %key, "Version file attached");

        let node = self.node_mut(id);
        node.file = Some(VariantFile {
            key,
            location,
            original_filename: original.to_string(),
            filename: original.to_string(),
            content_type: None,
            data: None,
        });
        node.cache_id = cache_id;
        node.cached_in = cache_id;
        node.state = state;
    }

    async fn recreate_versions(&mut self, names: &[&str]) -> Result<(), VersionError> {
        let Some(original) = self.root().file().map(|f| f.original_filename.clone()) else {
            return Err(VersionError::NoFile(self.describe(NodeId::ROOT)));
        };

        if names.is_empty() {
            let current = self.processed_artifact(NodeId::ROOT).await?;
            self.cache_node(NodeId::ROOT, current, original, CacheId::generate(), false)
                .await?;
            return self.store_node(NodeId::ROOT, None, None).await;
        }

        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let active = self.active_variants(NodeId::ROOT)?;
        let targets = select(&active, &names)?;

        let session = CacheId::generate();
        let root = self.root();
        let previous = if root.state == VariantState::Cached {
            None
        } else {
            let previous = (root.file.clone(), root.state);
            let current = self.processed_artifact(NodeId::ROOT).await?;
            self.base_cache(NodeId::ROOT, current, original, session, false)
                .await?;
            Some(previous)
        };

        for child in &targets {
            self.node_mut(*child).cache_id = Some(session);
        }
        let processed_parent = self.processed_artifact(NodeId::ROOT).await?;
        let mut in_progress = Vec::new();
        for child in targets {
            self.cache_child(NodeId::ROOT, child, &processed_parent, session, &mut in_progress)
                .await?;
        }
        self.propagate_store(NodeId::ROOT, None, Some(names), Some(session))
            .await?;

        // The uploader was only cached to feed its versions
        if let Some((file, state)) = previous {
            if let Some(cached) = self.root().file.as_ref().map(|f| f.key.clone()) {
                self.storage.remove(&cached).await?;
            }
            let node = self.node_mut(NodeId::ROOT);
            node.file = file;
            node.state = state;
            node.cache_id = None;
            node.cached_in = None;
        }
        Ok(())
    }

    /// The file held by `id` as an artifact, under the name its pipeline gave it.
    async fn processed_artifact(&mut self, id: NodeId) -> Result<Artifact, VersionError> {
        let data = self.load_data(id).await?;
        let file = self.nodes[id.0]
            .file
            .as_ref()
            .ok_or_else(|| VersionError::NoFile(self.describe(id)))?;
        Ok(Artifact {
            data,
            filename: file.filename.clone(),
            content_type: file.content_type.clone(),
        })
    }

    /// Uploaded filename the keys of `id` are built from. Versions take it
    /// from their parent, so a stage renaming the file does not move them.
    fn original_for(&self, id: NodeId, input: &Artifact) -> String {
        self.nodes[id.0]
            .parent
            .and_then(|parent| self.nodes[parent.0].file.as_ref())
            .map(|file| file.original_filename.clone())
            .unwrap_or_else(|| input.filename.clone())
    }

    async fn load_data(&mut self, id: NodeId) -> Result<Bytes, VersionError> {
        let key = match self.nodes[id.0].file.as_ref() {
            Some(VariantFile { data: Some(data), .. }) => return Ok(data.clone()),
            Some(file) => file.key.clone(),
            None => return Err(VersionError::NoFile(self.describe(id))),
        };

        let data = self.storage.retrieve(&key).await?;
        tracing::debug!(
            variant = %self.describe(id),
            path = %key,
            size = data.len(),
            "Version file loaded"
        );
        if let Some(file) = self.node_mut(id).file.as_mut() {
            file.data = Some(data.clone());
        }
        Ok(data)
    }
}

/// Pick `names` out of `active`, in the order given. Every name is checked
/// before anything is returned.
fn select(active: &[(String, NodeId)], names: &[String]) -> Result<Vec<NodeId>, VersionError> {
    names
        .iter()
        .map(|name| {
            active
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, child)| *child)
                .ok_or_else(|| VersionError::UnknownVariant(name.clone()))
        })
        .collect()
}

fn parse_cache_name(cache_name: &str) -> Result<(CacheId, String), VersionError> {
    let invalid = || VersionError::InvalidCacheName(cache_name.to_string());
    let (cache_id, original) = keys::split_cache_name(cache_name).ok_or_else(invalid)?;
    if sanitize_filename(original) != original {
        return Err(invalid());
    }
    let cache_id = cache_id.parse::<CacheId>().map_err(|_| invalid())?;
    Ok((cache_id, original.to_string()))
}

fn report(err: VersionError, operation: &str) -> VersionError {
    log_error(&err, operation);
    err
}
