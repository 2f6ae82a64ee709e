//! Instance tree
//!
//! An [`Uploader`] binds one artifact to the definitions of its uploader
//! type. Instances are created lazily: a node's versions are only built the
//! first time something asks for them, and are then kept for the lifetime of
//! the uploader.

use std::sync::Arc;

use varia_core::VariaConfig;
use varia_storage::{keys, Storage};

use crate::condition::ConditionContext;
use crate::definition::{ProcessingSettings, VariantDefinition, VariantOptions};
use crate::error::VersionError;
use crate::host::{DynamicVariants, HostContext};
use crate::instance::{CacheId, NodeId, VariantInstance};
use crate::registry::DefinitionRegistry;

/// Runtime tree of version instances for one artifact.
///
/// The uploader instance itself is [`NodeId::ROOT`]. Every other node is a
/// version, reachable through [`Uploader::variants`].
pub struct Uploader {
    registry: Arc<DefinitionRegistry>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) host: Arc<dyn HostContext>,
    pub(crate) config: Arc<VariaConfig>,
    pub(crate) nodes: Vec<VariantInstance>,
}

impl Uploader {
    pub fn new(
        registry: Arc<DefinitionRegistry>,
        storage: Arc<dyn Storage>,
        host: Arc<dyn HostContext>,
        config: Arc<VariaConfig>,
    ) -> Self {
        let root = VariantInstance::new(None, Arc::clone(registry.root()), None);
        Self {
            registry,
            storage,
            host,
            config,
            nodes: vec![root],
        }
    }

    pub fn registry(&self) -> &Arc<DefinitionRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn config(&self) -> &VariaConfig {
        &self.config
    }

    pub fn root(&self) -> &VariantInstance {
        &self.nodes[NodeId::ROOT.0]
    }

    /// Instance behind `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this uploader.
    pub fn node(&self, id: NodeId) -> &VariantInstance {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut VariantInstance {
        &mut self.nodes[id.0]
    }

    /// Number of instances built so far, the root included.
    pub fn instance_count(&self) -> usize {
        self.nodes.len()
    }

    /// Versions of `id`, in definition order then dynamic order.
    ///
    /// The first call builds the instances and gives the host a chance to add
    /// dynamic versions; later calls return the same nodes.
    pub fn variants(&mut self, id: NodeId) -> Result<Vec<(String, NodeId)>, VersionError> {
        self.materialize(id)?;
        Ok(self.nodes[id.0].children.clone().unwrap_or_default())
    }

    /// Version `name` of `id`, active or not.
    pub fn variant(&mut self, id: NodeId, name: &str) -> Result<NodeId, VersionError> {
        self.materialize(id)?;
        self.child_named(id, name)
            .ok_or_else(|| VersionError::UnknownVariant(name.to_string()))
    }

    fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .flatten()
            .find(|(n, _)| n == name)
            .map(|(_, child)| *child)
    }

    /// Resolve a dotted path such as `"thumb.small"` from the root.
    pub fn find(&mut self, path: &str) -> Result<NodeId, VersionError> {
        let mut current = NodeId::ROOT;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = self.variant(current, segment)?;
        }
        Ok(current)
    }

    /// Add a version to this instance only.
    ///
    /// Memoized by name: a second call with the same name returns the
    /// existing node and ignores `options` and `body`.
    pub fn add_dynamic_variant<F>(
        &mut self,
        id: NodeId,
        name: &str,
        options: VariantOptions,
        body: F,
    ) -> Result<NodeId, VersionError>
    where
        F: FnOnce(&mut VariantDefinition) -> Result<(), VersionError>,
    {
        self.materialize(id)?;
        if let Some(existing) = self.child_named(id, name) {
            return Ok(existing);
        }

        let mut definition = self.nodes[id.0]
            .definition
            .generate_variant_type(name, options)?;
        body(&mut definition)?;
        let definition = Arc::new(definition);

        self.nodes[id.0].dynamic.push(Arc::clone(&definition));
        let child = self.push_node(definition, id);
        if let Some(children) = self.nodes[id.0].children.as_mut() {
            children.push((name.to_string(), child));
        }

        tracing::debug!(
            variant = name,
            parent = ?self.variant_name(id),
            "Dynamic version added"
        );
        Ok(child)
    }

    /// Versions of `id` whose conditions currently hold.
    ///
    /// Conditions are evaluated on every call against the instance's current
    /// file, so the result follows changes in host state.
    pub fn active_variants(&mut self, id: NodeId) -> Result<Vec<(String, NodeId)>, VersionError> {
        let variants = self.variants(id)?;
        let parent_version = self.variant_name(id);
        let file = self.nodes[id.0].file.as_ref();

        let mut active = Vec::with_capacity(variants.len());
        for (name, child) in variants {
            let options = self.nodes[child.0].definition.options();
            let ctx = ConditionContext {
                host: self.host.as_ref(),
                variant: &name,
                parent_version: parent_version.as_deref(),
                file,
            };

            let included = options.condition.evaluate(&ctx)?.unwrap_or(true)
                && !options.unless.evaluate(&ctx)?.unwrap_or(false);
            if included {
                active.push((name, child));
            } else {
                tracing::debug!(variant = %name, "Version inactive, skipped");
            }
        }

        Ok(active)
    }

    /// Qualified name: names from the root down to `id`, joined by the
    /// configured separator. `None` for the root.
    pub fn variant_name(&self, id: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if let Some(name) = node.name() {
                names.push(name);
            }
            current = node.parent;
        }

        if names.is_empty() {
            return None;
        }
        names.reverse();
        Some(names.join(self.config.version_separator.as_str()))
    }

    /// Name used in logs and errors.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        self.variant_name(id)
            .unwrap_or_else(|| self.registry.uploader_type().to_string())
    }

    pub fn enable_processing(&self, id: NodeId) -> bool {
        self.resolve_setting(id, |s| s.enable_processing)
            .unwrap_or(self.config.enable_processing)
    }

    pub fn cache_dir(&self, id: NodeId) -> String {
        self.resolve_setting(id, |s| s.cache_dir.clone())
            .unwrap_or_else(|| self.config.cache_dir.clone())
    }

    /// Store directory, defaulting to `{store_dir}/{model_name}/{mounted_as}/{model_id}`.
    pub fn store_dir(&self, id: NodeId) -> String {
        self.resolve_setting(id, |s| s.store_dir.clone())
            .unwrap_or_else(|| self.default_store_dir())
    }

    fn default_store_dir(&self) -> String {
        let model_id = self.host.model_id();
        keys::join_key([
            Some(self.config.store_dir.as_str()),
            self.host.model_name(),
            self.host.mounted_as(),
            model_id.as_deref(),
        ]
        .into_iter()
        .flatten())
    }

    pub(crate) fn full_filename(&self, id: NodeId, original_filename: &str) -> String {
        keys::full_filename(
            self.variant_name(id).as_deref(),
            &self.config.version_separator,
            original_filename,
        )
    }

    pub(crate) fn cache_key(&self, id: NodeId, cache_id: CacheId, original_filename: &str) -> String {
        keys::cache_key(
            &self.cache_dir(id),
            &cache_id.to_string(),
            &self.full_filename(id, original_filename),
        )
    }

    pub(crate) fn store_key(&self, id: NodeId, original_filename: &str) -> String {
        keys::store_key(&self.store_dir(id), &self.full_filename(id, original_filename))
    }

    fn resolve_setting<T, F>(&self, id: NodeId, get: F) -> Option<T>
    where
        F: Fn(&ProcessingSettings) -> Option<T>,
    {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if let Some(value) = get(node.definition.settings()) {
                return Some(value);
            }
            current = node.parent;
        }
        None
    }

    fn materialize(&mut self, id: NodeId) -> Result<(), VersionError> {
        if self.nodes[id.0].children.is_some() {
            return Ok(());
        }

        let node = &self.nodes[id.0];
        let mut definitions: Vec<Arc<VariantDefinition>> = node.definition.children().to_vec();
        definitions.extend(node.dynamic.iter().cloned());

        let existing = definitions.iter().map(|d| d.name().to_string()).collect();
        let mut dynamic = DynamicVariants::new(
            self.variant_name(id),
            existing,
            node.definition.policy(),
        );
        self.host.add_dynamic_variants(&mut dynamic)?;

        let added: Vec<Arc<VariantDefinition>> =
            dynamic.into_added().into_iter().map(Arc::new).collect();
        self.nodes[id.0].dynamic.extend(added.iter().cloned());
        definitions.extend(added);

        let mut children = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let name = definition.name().to_string();
            let child = self.push_node(definition, id);
            children.push((name, child));
        }
        self.nodes[id.0].children = Some(children);

        Ok(())
    }

    fn push_node(&mut self, definition: Arc<VariantDefinition>, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = definition.name().to_string();
        self.nodes
            .push(VariantInstance::new(Some(name), definition, Some(parent)));
        id
    }
}
