//! Varia Processing Library
//!
//! Processing stages turn one artifact into another. A version definition
//! owns a [`ProcessingPipeline`], an ordered list of shared stages, which the
//! version engine runs when the version is cached.

pub mod error;
#[cfg(feature = "image")]
pub mod image;
pub mod pipeline;
pub mod traits;

pub use error::ProcessingError;
#[cfg(feature = "image")]
pub use image::{ConvertFormat, ResizeToFill, ResizeToFit};
pub use pipeline::ProcessingPipeline;
pub use traits::{FnStage, ProcessingStage};
