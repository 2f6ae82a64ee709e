//! Activation conditions for versions.

use std::fmt;
use std::sync::Arc;

use crate::error::VersionError;
use crate::host::HostContext;
use crate::instance::VariantFile;

/// What a condition sees when it is evaluated.
pub struct ConditionContext<'a> {
    pub host: &'a dyn HostContext,
    /// Name of the version being tested (unqualified)
    pub variant: &'a str,
    /// Qualified name of the instance that owns the version, `None` at the root
    pub parent_version: Option<&'a str>,
    /// File currently held by the owning instance
    pub file: Option<&'a VariantFile>,
}

pub type PredicateFn = dyn Fn(&ConditionContext<'_>) -> bool + Send + Sync;

/// Activation predicate attached to a version.
#[derive(Clone, Default)]
pub enum Condition {
    /// Always active
    #[default]
    None,
    /// Inline predicate
    Predicate(Arc<PredicateFn>),
    /// Check dispatched to [`HostContext::named_check`] by name
    NamedCheck(String),
}

impl Condition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&ConditionContext<'_>) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(f))
    }

    pub fn named(check: impl Into<String>) -> Self {
        Condition::NamedCheck(check.into())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Condition::None)
    }

    /// `Ok(None)` when there is no condition to evaluate.
    pub fn evaluate(&self, ctx: &ConditionContext<'_>) -> Result<Option<bool>, VersionError> {
        match self {
            Condition::None => Ok(None),
            Condition::Predicate(f) => Ok(Some(f(ctx))),
            Condition::NamedCheck(check) => ctx
                .host
                .named_check(check, ctx)
                .map(Some)
                .ok_or_else(|| VersionError::UnknownCondition(check.clone())),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::None => write!(f, "None"),
            Condition::Predicate(_) => write!(f, "Predicate(..)"),
            Condition::NamedCheck(check) => f.debug_tuple("NamedCheck").field(check).finish(),
        }
    }
}
