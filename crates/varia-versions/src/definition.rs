//! Version definitions
//!
//! A [`VariantDefinition`] describes one version independently of any file:
//! when it is active, what it is derived from, how it is processed and which
//! nested versions it has. Definitions form a tree that is built once at
//! declaration time and shared read-only by every instance afterwards.

use std::sync::Arc;

use varia_processing::{ProcessingPipeline, ProcessingStage};

use crate::condition::Condition;
use crate::error::VersionError;

/// Per-version options set at declaration.
#[derive(Clone, Debug, Default)]
pub struct VariantOptions {
    /// Version is active only when this evaluates true
    pub condition: Condition,
    /// Version is inactive when this evaluates true
    pub unless: Condition,
    /// Sibling whose cached output is this version's input
    pub depends_on: Option<String>,
}

impl VariantOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn unless(mut self, condition: Condition) -> Self {
        self.unless = condition;
        self
    }

    pub fn depends_on(mut self, sibling: impl Into<String>) -> Self {
        self.depends_on = Some(sibling.into());
        self
    }

    /// Fold a later declaration into this one. Fields the later declaration
    /// sets replace ours.
    pub fn merge(&mut self, later: VariantOptions) {
        if !later.condition.is_none() {
            self.condition = later.condition;
        }
        if !later.unless.is_none() {
            self.unless = later.unless;
        }
        if later.depends_on.is_some() {
            self.depends_on = later.depends_on;
        }
    }
}

/// Settings that resolve to the nearest ancestor's value when unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessingSettings {
    pub enable_processing: Option<bool>,
    pub cache_dir: Option<String>,
    pub store_dir: Option<String>,
}

/// How a second declaration of the same version name is handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RedeclarePolicy {
    /// Merge options, later values win
    #[default]
    LastWins,
    /// Merge options, but refuse a different `depends_on`
    RejectConflicts,
}

#[derive(Clone, Debug)]
pub struct VariantDefinition {
    name: String,
    options: VariantOptions,
    settings: ProcessingSettings,
    pipeline: ProcessingPipeline,
    children: Vec<Arc<VariantDefinition>>,
    policy: RedeclarePolicy,
}

impl VariantDefinition {
    pub(crate) fn new(name: impl Into<String>, options: VariantOptions) -> Self {
        Self {
            name: name.into(),
            options,
            settings: ProcessingSettings::default(),
            pipeline: ProcessingPipeline::new(),
            children: Vec::new(),
            policy: RedeclarePolicy::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &VariantOptions {
        &self.options
    }

    pub fn settings(&self) -> &ProcessingSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ProcessingSettings {
        &mut self.settings
    }

    pub fn pipeline(&self) -> &ProcessingPipeline {
        &self.pipeline
    }

    pub fn children(&self) -> &[Arc<VariantDefinition>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Arc<VariantDefinition>> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn policy(&self) -> RedeclarePolicy {
        self.policy
    }

    pub(crate) fn set_policy(&mut self, policy: RedeclarePolicy) {
        self.policy = policy;
    }

    /// Append a processing stage.
    pub fn process(&mut self, stage: impl ProcessingStage + 'static) -> &mut Self {
        self.pipeline.add_stage(Arc::new(stage));
        self
    }

    /// Append a stage that is shared with other definitions.
    pub fn process_shared(&mut self, stage: Arc<dyn ProcessingStage>) -> &mut Self {
        self.pipeline.add_stage(stage);
        self
    }

    pub fn enable_processing(&mut self, enabled: bool) -> &mut Self {
        self.settings.enable_processing = Some(enabled);
        self
    }

    pub fn store_dir(&mut self, dir: impl Into<String>) -> &mut Self {
        self.settings.store_dir = Some(dir.into());
        self
    }

    pub fn cache_dir(&mut self, dir: impl Into<String>) -> &mut Self {
        self.settings.cache_dir = Some(dir.into());
        self
    }

    /// Declare a nested version, or extend it if `name` is already declared.
    ///
    /// A re-declaration keeps the existing slot: the options are merged and
    /// `body` runs against the existing definition, so several declarations
    /// add up. With [`RedeclarePolicy::RejectConflicts`] a different
    /// `depends_on` fails with [`VersionError::DuplicateVariant`].
    pub fn declare_variant<F>(
        &mut self,
        name: &str,
        options: VariantOptions,
        body: F,
    ) -> Result<&mut VariantDefinition, VersionError>
    where
        F: FnOnce(&mut VariantDefinition) -> Result<(), VersionError>,
    {
        validate_name(name)?;

        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => {
                let existing = Arc::make_mut(&mut self.children[index]);
                if self.policy == RedeclarePolicy::RejectConflicts {
                    if let (Some(current), Some(requested)) =
                        (&existing.options.depends_on, &options.depends_on)
                    {
                        if current != requested {
                            return Err(VersionError::DuplicateVariant {
                                name: name.to_string(),
                                reason: format!(
                                    "depends_on '{}' conflicts with '{}'",
                                    requested, current
                                ),
                            });
                        }
                    }
                }
                existing.options.merge(options);
                body(existing)?;
                index
            }
            None => {
                let mut definition = self.generate_variant_type(name, options)?;
                body(&mut definition)?;
                self.children.push(Arc::new(definition));
                self.children.len() - 1
            }
        };

        tracing::debug!(version = name, "Version declared");
        Ok(Arc::make_mut(&mut self.children[index]))
    }

    /// Build a fresh definition derived from this one.
    ///
    /// The new definition starts with an empty pipeline, empty settings and
    /// no children: processing steps are never inherited, and unset settings
    /// fall back to the ancestors at runtime. Only the redeclaration policy
    /// is carried over.
    pub fn generate_variant_type(
        &self,
        name: &str,
        options: VariantOptions,
    ) -> Result<VariantDefinition, VersionError> {
        validate_name(name)?;
        let mut definition = VariantDefinition::new(name, options);
        definition.policy = self.policy;
        Ok(definition)
    }

    /// Visit every descendant definition, depth-first, parents before children.
    pub fn for_each_descendant_definition<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&mut VariantDefinition),
    {
        self.visit_descendants(&mut visitor);
    }

    fn visit_descendants(&mut self, visitor: &mut dyn FnMut(&mut VariantDefinition)) {
        for child in &mut self.children {
            let child = Arc::make_mut(child);
            visitor(child);
            child.visit_descendants(visitor);
        }
    }
}

/// Version names become path and key segments.
pub(crate) fn validate_name(name: &str) -> Result<(), VersionError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(VersionError::InvalidVariantName(name.to_string()))
    }
}
