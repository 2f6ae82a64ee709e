//! Varia CLI support: manifest loading, the command-line host and reporting.

pub mod manifest;

use serde::Serialize;
use varia_versions::{ConditionContext, HostContext, NodeId, Uploader, VersionError};

pub use manifest::Manifest;

/// Host built from command-line flags.
///
/// Answers the `is_image` and `is_landscape` checks from the file held by
/// the instance that owns the version being tested.
#[derive(Debug, Default, Clone)]
pub struct CliHost {
    pub model_name: Option<String>,
    pub model_id: Option<String>,
    pub mounted_as: Option<String>,
}

impl HostContext for CliHost {
    fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    fn model_id(&self) -> Option<String> {
        self.model_id.clone()
    }

    fn mounted_as(&self) -> Option<&str> {
        self.mounted_as.as_deref()
    }

    fn named_check(&self, check: &str, ctx: &ConditionContext<'_>) -> Option<bool> {
        match check {
            "is_image" => Some(
                ctx.file
                    .and_then(|f| f.content_type.as_deref())
                    .map(|ct| ct.starts_with("image/"))
                    .unwrap_or(false),
            ),
            "is_landscape" => Some(is_landscape(ctx)),
            _ => None,
        }
    }
}

#[cfg(feature = "image")]
fn is_landscape(ctx: &ConditionContext<'_>) -> bool {
    ctx.file
        .and_then(|f| f.data())
        .and_then(|data| varia_processing::image::dimensions(data))
        .map(|(width, height)| width > height)
        .unwrap_or(false)
}

#[cfg(not(feature = "image"))]
fn is_landscape(_ctx: &ConditionContext<'_>) -> bool {
    false
}

/// Content type guessed from a filename's extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// One row of the `derive_versions` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    pub version: String,
    pub state: String,
    pub location: Option<String>,
    pub size: Option<usize>,
}

/// Every instance of the tree, depth-first, the uploader first.
pub fn collect_report(uploader: &mut Uploader) -> Result<Vec<VersionReport>, VersionError> {
    let mut rows = Vec::new();
    let mut pending = vec![NodeId::ROOT];
    while let Some(id) = pending.pop() {
        let node = uploader.node(id);
        rows.push(VersionReport {
            version: uploader
                .variant_name(id)
                .unwrap_or_else(|| "(original)".to_string()),
            state: format!("{:?}", node.state()).to_lowercase(),
            location: node.file().map(|f| f.location.clone()),
            size: node.file().and_then(|f| f.data()).map(|d| d.len()),
        });

        let children = uploader.variants(id)?;
        pending.extend(children.into_iter().rev().map(|(_, child)| child));
    }
    Ok(rows)
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
