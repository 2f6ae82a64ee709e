//! Host integration points
//!
//! The host owns the record an uploaded file belongs to. It supplies naming
//! context for storage keys, answers named condition checks, and may add
//! versions computed from its own state.

use crate::condition::ConditionContext;
use crate::definition::{validate_name, RedeclarePolicy, VariantDefinition, VariantOptions};
use crate::error::VersionError;

pub trait HostContext: Send + Sync {
    /// Model name used in the default store directory (e.g. "user")
    fn model_name(&self) -> Option<&str> {
        None
    }

    /// Identifier of the owning record
    fn model_id(&self) -> Option<String> {
        None
    }

    /// Attribute the uploader is mounted on (e.g. "avatar")
    fn mounted_as(&self) -> Option<&str> {
        None
    }

    /// Answer a named condition. `None` means the check is unknown.
    fn named_check(&self, _check: &str, _ctx: &ConditionContext<'_>) -> Option<bool> {
        None
    }

    /// Add instance-specific versions. Runs once per instance, when its
    /// versions are first materialized.
    fn add_dynamic_variants(&self, _variants: &mut DynamicVariants) -> Result<(), VersionError> {
        Ok(())
    }
}

/// Host with no model, no checks and no dynamic versions.
pub struct NoHost;

impl HostContext for NoHost {}

/// Add-only view of an instance's versions handed to
/// [`HostContext::add_dynamic_variants`].
pub struct DynamicVariants {
    parent: Option<String>,
    existing: Vec<String>,
    policy: RedeclarePolicy,
    added: Vec<VariantDefinition>,
}

impl DynamicVariants {
    pub(crate) fn new(
        parent: Option<String>,
        existing: Vec<String>,
        policy: RedeclarePolicy,
    ) -> Self {
        Self {
            parent,
            existing,
            policy,
            added: Vec::new(),
        }
    }

    /// Qualified name of the instance being materialized, `None` at the root.
    pub fn parent_version(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.existing.iter().any(|n| n == name) || self.added.iter().any(|d| d.name() == name)
    }

    /// Add a version. Returns `false` and leaves everything unchanged if the
    /// name is already taken.
    pub fn add<F>(&mut self, name: &str, options: VariantOptions, body: F) -> Result<bool, VersionError>
    where
        F: FnOnce(&mut VariantDefinition) -> Result<(), VersionError>,
    {
        if self.contains(name) {
            return Ok(false);
        }
        validate_name(name)?;
        let mut definition = VariantDefinition::new(name, options);
        definition.set_policy(self.policy);
        body(&mut definition)?;
        self.added.push(definition);
        Ok(true)
    }

    pub(crate) fn into_added(self) -> Vec<VariantDefinition> {
        self.added
    }
}
