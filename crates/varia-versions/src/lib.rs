//! Varia Versions
//!
//! Version-tree lifecycle engine. A [`DefinitionRegistry`] declares, once per
//! uploader type, which versions exist and how each is derived. An
//! [`Uploader`] binds those definitions to one artifact and drives the whole
//! tree through cache, store, retrieve and remove.
//!
//! ```ignore
//! let mut registry = DefinitionRegistry::new("avatar");
//! registry.declare_variant("thumb", VariantOptions::new(), |thumb| {
//!     thumb.process(ResizeToFit { width: 200, height: 200 });
//!     thumb.declare_variant("small", VariantOptions::new(), |small| {
//!         small.process(ResizeToFill { width: 32, height: 32 });
//!         Ok(())
//!     })?;
//!     Ok(())
//! })?;
//!
//! let mut uploader = Uploader::new(registry.freeze(), storage, host, config);
//! uploader.cache(artifact).await?;
//! uploader.store(None).await?;
//! let url = uploader.resolve_path(NodeId::ROOT, "thumb.small")?;
//! ```

pub mod condition;
pub mod definition;
pub mod error;
pub mod host;
pub mod instance;
mod lifecycle;
pub mod registry;
pub mod resolve;
pub mod tree;

pub use condition::{Condition, ConditionContext};
pub use definition::{ProcessingSettings, RedeclarePolicy, VariantDefinition, VariantOptions};
pub use error::VersionError;
pub use host::{DynamicVariants, HostContext, NoHost};
pub use instance::{CacheId, NodeId, VariantFile, VariantInstance, VariantState};
pub use registry::DefinitionRegistry;
pub use resolve::LocationArg;
pub use tree::Uploader;
