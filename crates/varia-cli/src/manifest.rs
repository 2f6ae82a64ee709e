//! JSON manifest describing an uploader type and its versions.
//!
//! ```json
//! {
//!   "type": "avatar",
//!   "process": [{ "convert": "png" }],
//!   "variants": [
//!     { "name": "thumb", "process": [{ "resize_to_fit": [200, 200] }],
//!       "variants": [{ "name": "small", "process": [{ "resize_to_fill": [32, 32] }] }] },
//!     { "name": "banner", "if": "is_landscape", "depends_on": "thumb" }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;
use varia_processing::ProcessingStage;
use varia_versions::{Condition, DefinitionRegistry, VariantDefinition, VariantOptions, VersionError};

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(rename = "type")]
    pub uploader_type: String,
    #[serde(default)]
    pub store_dir: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub process: Vec<StageSpec>,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
}

#[derive(Debug, Deserialize)]
pub struct VariantSpec {
    pub name: String,
    #[serde(default)]
    pub depends_on: Option<String>,
    /// Named check that must hold
    #[serde(default, rename = "if")]
    pub condition: Option<String>,
    /// Named check that must not hold
    #[serde(default)]
    pub unless: Option<String>,
    #[serde(default)]
    pub enable_processing: Option<bool>,
    #[serde(default)]
    pub process: Vec<StageSpec>,
    #[serde(default)]
    pub variants: Vec<VariantSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageSpec {
    ResizeToFit([u32; 2]),
    ResizeToFill([u32; 2]),
    Convert(String),
}

/// A version spec whose stages have been built.
struct Prepared<'a> {
    spec: &'a VariantSpec,
    stages: Vec<Arc<dyn ProcessingStage>>,
    children: Vec<Prepared<'a>>,
}

impl Manifest {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid version manifest")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_json(&json)
    }

    /// Declare every version of the manifest on a new registry.
    pub fn build_registry(&self) -> anyhow::Result<DefinitionRegistry> {
        let prepared = self
            .variants
            .iter()
            .map(prepare)
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut registry = DefinitionRegistry::new(self.uploader_type.clone());
        for stage in &self.process {
            registry.root_mut().process_shared(build_stage(stage)?);
        }
        let settings = registry.settings_mut();
        settings.store_dir = self.store_dir.clone();
        settings.cache_dir = self.cache_dir.clone();

        for variant in prepared {
            let spec = variant.spec;
            registry.declare_variant(&spec.name, options(spec), |definition| {
                apply(definition, variant)
            })?;
        }

        Ok(registry)
    }
}

fn prepare(spec: &VariantSpec) -> anyhow::Result<Prepared<'_>> {
    let stages = spec
        .process
        .iter()
        .map(build_stage)
        .collect::<anyhow::Result<Vec<_>>>()
        .with_context(|| format!("Version '{}'", spec.name))?;
    let children = spec
        .variants
        .iter()
        .map(prepare)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Prepared {
        spec,
        stages,
        children,
    })
}

fn options(spec: &VariantSpec) -> VariantOptions {
    let mut options = VariantOptions::new();
    if let Some(check) = &spec.condition {
        options = options.condition(Condition::named(check.as_str()));
    }
    if let Some(check) = &spec.unless {
        options = options.unless(Condition::named(check.as_str()));
    }
    if let Some(sibling) = &spec.depends_on {
        options = options.depends_on(sibling.as_str());
    }
    options
}

fn apply(definition: &mut VariantDefinition, prepared: Prepared<'_>) -> Result<(), VersionError> {
    if let Some(enabled) = prepared.spec.enable_processing {
        definition.enable_processing(enabled);
    }
    for stage in prepared.stages {
        definition.process_shared(stage);
    }
    for child in prepared.children {
        let spec = child.spec;
        definition.declare_variant(&spec.name, options(spec), |nested| apply(nested, child))?;
    }
    Ok(())
}

#[cfg(feature = "image")]
fn build_stage(spec: &StageSpec) -> anyhow::Result<Arc<dyn ProcessingStage>> {
    use varia_processing::{ConvertFormat, ResizeToFill, ResizeToFit};

    Ok(match spec {
        StageSpec::ResizeToFit([width, height]) => Arc::new(ResizeToFit {
            width: *width,
            height: *height,
        }),
        StageSpec::ResizeToFill([width, height]) => Arc::new(ResizeToFill {
            width: *width,
            height: *height,
        }),
        StageSpec::Convert(format) => Arc::new(
            ConvertFormat::from_extension(format)
                .ok_or_else(|| anyhow::anyhow!("Unsupported target format '{}'", format))?,
        ),
    })
}

#[cfg(not(feature = "image"))]
fn build_stage(spec: &StageSpec) -> anyhow::Result<Arc<dyn ProcessingStage>> {
    Err(anyhow::anyhow!(
        "Stage {:?} requires the `image` feature",
        spec
    ))
}
