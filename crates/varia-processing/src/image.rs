//! Image stages
//!
//! Thin wrappers over the `image` crate: decode, resize or re-encode, and
//! write back in the artifact's format. Decoding runs on the blocking pool.

use crate::traits::ProcessingStage;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use varia_core::Artifact;

fn decode(data: &[u8]) -> Result<DynamicImage, anyhow::Error> {
    let img = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()
        .context("Failed to decode image")?;
    Ok(img)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Bytes, anyhow::Error> {
    let (width, height) = (img.width(), img.height());
    let mut buffer = Vec::with_capacity((width * height * 3) as usize);
    // JPEG has no alpha channel
    let flattened;
    let img = if format == ImageFormat::Jpeg && img.color().has_alpha() {
        flattened = DynamicImage::ImageRgb8(img.to_rgb8());
        &flattened
    } else {
        img
    };
    img.write_to(&mut Cursor::new(&mut buffer), format)
        .with_context(|| format!("Failed to encode image as {:?}", format))?;
    Ok(Bytes::from(buffer))
}

/// Format to write back: the filename's extension, then the sniffed content,
/// then PNG.
fn output_format(artifact: &Artifact) -> ImageFormat {
    artifact
        .extension()
        .and_then(ImageFormat::from_extension)
        .or_else(|| image::guess_format(&artifact.data).ok())
        .unwrap_or(ImageFormat::Png)
}

/// Width and height of an encoded image, without decoding the pixels.
pub fn dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

async fn transform<F>(input: Artifact, op: F) -> Result<Artifact, anyhow::Error>
where
    F: FnOnce(DynamicImage) -> DynamicImage + Send + 'static,
{
    let format = output_format(&input);
    let data = input.data.clone();
    let encoded = tokio::task::spawn_blocking(move || {
        let img = decode(&data)?;
        encode(&op(img), format)
    })
    .await
    .context("Image task panicked")??;
    Ok(input
        .with_data(encoded)
        .with_content_type(format.to_mime_type()))
}

/// Scale down or up to fit within `width` x `height`, keeping the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeToFit {
    pub width: u32,
    pub height: u32,
}

#[async_trait]
impl ProcessingStage for ResizeToFit {
    fn name(&self) -> &str {
        "resize_to_fit"
    }

    async fn apply(&self, input: Artifact) -> Result<Artifact, anyhow::Error> {
        let (width, height) = (self.width, self.height);
        transform(input, move |img| img.resize(width, height, FilterType::Lanczos3)).await
    }
}

/// Scale and crop to exactly `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeToFill {
    pub width: u32,
    pub height: u32,
}

#[async_trait]
impl ProcessingStage for ResizeToFill {
    fn name(&self) -> &str {
        "resize_to_fill"
    }

    async fn apply(&self, input: Artifact) -> Result<Artifact, anyhow::Error> {
        let (width, height) = (self.width, self.height);
        transform(input, move |img| {
            img.resize_to_fill(width, height, FilterType::Lanczos3)
        })
        .await
    }
}

/// Re-encode into another format and swap the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertFormat {
    pub format: ImageFormat,
}

impl ConvertFormat {
    /// Parse a target such as `"png"` or `"webp"`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ImageFormat::from_extension(ext).map(|format| Self { format })
    }
}

#[async_trait]
impl ProcessingStage for ConvertFormat {
    fn name(&self) -> &str {
        "convert"
    }

    async fn apply(&self, input: Artifact) -> Result<Artifact, anyhow::Error> {
        let format = self.format;
        let extension = format
            .extensions_str()
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("No extension known for {:?}", format))?;
        let stem = input
            .filename
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| input.filename.clone());

        let data = input.data.clone();
        let encoded = tokio::task::spawn_blocking(move || encode(&decode(&data)?, format))
            .await
            .context("Image task panicked")??;

        Ok(Artifact {
            data: encoded,
            filename: format!("{}.{}", stem, extension),
            content_type: Some(format.to_mime_type().to_string()),
        })
    }
}
