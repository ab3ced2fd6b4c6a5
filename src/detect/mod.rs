//! Saliency detection — pluggable trait plus the built-in detector.
//!
//! The [`SaliencyDetector`] trait is the seam between the analysis pipeline
//! and whatever estimates "the visually important region" of an image. The
//! production implementation is [`EdgeDetector`] — gradient energy plus local
//! variance over a downscaled luma buffer, no model files, statically linked.
//!
//! Detectors are treated as slow and untrusted: the analysis layer caps how
//! many run concurrently and isolates individual failures (see
//! [`crate::analysis`]).

use crate::geometry::SalientRegion;
use image::DynamicImage;
use thiserror::Error;

mod edge_detector;

pub use edge_detector::EdgeDetector;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("image too small to analyze ({0}x{1})")]
    ImageTooSmall(u32, u32),
    #[error("detection failed: {0}")]
    Failed(String),
}

/// Pluggable saliency detection backend.
///
/// `detect` suggests the most visually important region of `image` for a
/// crop targeting `target_width` × `target_height` output pixels. The
/// suggestion is resolution-dependent: a change of target dimensions
/// requires a fresh detection.
pub trait SaliencyDetector: Send + Sync {
    fn detect(
        &self,
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<SalientRegion, DetectError>;
}
