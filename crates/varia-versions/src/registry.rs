//! Definition registry for an uploader type

use std::sync::Arc;

use varia_processing::ProcessingStage;

use crate::definition::{ProcessingSettings, RedeclarePolicy, VariantDefinition, VariantOptions};
use crate::error::VersionError;

/// Version definitions of one uploader type.
///
/// Built once while the type is declared, then frozen into an `Arc` and
/// handed to every [`Uploader`](crate::Uploader) of that type. The root
/// definition carries the type's own pipeline and settings; its children are
/// the top-level versions.
#[derive(Clone, Debug)]
pub struct DefinitionRegistry {
    uploader_type: String,
    root: Arc<VariantDefinition>,
}

impl DefinitionRegistry {
    /// Create an empty registry for `uploader_type`
    pub fn new(uploader_type: impl Into<String>) -> Self {
        let uploader_type = uploader_type.into();
        Self {
            root: Arc::new(VariantDefinition::new(
                uploader_type.clone(),
                VariantOptions::default(),
            )),
            uploader_type,
        }
    }

    /// Set how re-declarations are handled. Applies to versions declared
    /// after this call, at any depth.
    pub fn with_policy(mut self, policy: RedeclarePolicy) -> Self {
        self.root_mut().set_policy(policy);
        self
    }

    pub fn uploader_type(&self) -> &str {
        &self.uploader_type
    }

    pub fn root(&self) -> &Arc<VariantDefinition> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut VariantDefinition {
        Arc::make_mut(&mut self.root)
    }

    /// Declare a top-level version. See [`VariantDefinition::declare_variant`].
    pub fn declare_variant<F>(
        &mut self,
        name: &str,
        options: VariantOptions,
        body: F,
    ) -> Result<&mut VariantDefinition, VersionError>
    where
        F: FnOnce(&mut VariantDefinition) -> Result<(), VersionError>,
    {
        self.root_mut().declare_variant(name, options, body)
    }

    /// Build a fresh top-level definition without registering it.
    pub fn generate_variant_type(
        &self,
        name: &str,
        options: VariantOptions,
    ) -> Result<VariantDefinition, VersionError> {
        self.root.generate_variant_type(name, options)
    }

    /// Append a stage to the uploader type's own pipeline.
    pub fn process(&mut self, stage: impl ProcessingStage + 'static) -> &mut Self {
        self.root_mut().process(stage);
        self
    }

    pub fn settings_mut(&mut self) -> &mut ProcessingSettings {
        self.root_mut().settings_mut()
    }

    /// Visit every declared version, depth-first, parents before children.
    pub fn for_each_descendant_definition<F>(&mut self, visitor: F)
    where
        F: FnMut(&mut VariantDefinition),
    {
        self.root_mut().for_each_descendant_definition(visitor);
    }

    /// Top-level version names in declaration order.
    pub fn variant_names(&self) -> Vec<&str> {
        self.root.children().iter().map(|c| c.name()).collect()
    }

    /// Finish declaration.
    pub fn freeze(self) -> Arc<DefinitionRegistry> {
        tracing::debug!(
            uploader_type = %self.uploader_type,
            versions = ?self.variant_names(),
            "Definition registry frozen"
        );
        Arc::new(self)
    }
}
