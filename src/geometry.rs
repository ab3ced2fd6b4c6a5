//! Pure crop-geometry calculations.
//!
//! Everything here is a total function over finite numeric inputs — no I/O,
//! no state, no error paths. A zero-sized image produces a degenerate
//! zero-area rectangle, which callers must reject before an image ever
//! enters the collection (see [`crate::loader`]).
//!
//! # The framing model
//!
//! A [`Framing`] describes a crop in resolution-independent terms:
//!
//! - `center_x`, `center_y` in `[0, 1]`: where the crop is centered within
//!   the source image.
//! - `zoom >= 1`: 1 means the crop is the largest rectangle of the target
//!   aspect that fits inside the source ("fit"); larger values shrink the
//!   cropped region.
//! - `target_aspect`: width/height ratio the crop must satisfy.
//!
//! Because center and zoom are relative, the same framing applied to sources
//! of different native resolution means "the same crop" semantically — that
//! is what makes framings transferable between images and persistable across
//! sessions.

use serde::{Deserialize, Serialize};

/// Floor for the derived crop rectangle's dimensions, in source pixels.
/// Zoom is clamped so neither dimension falls below this.
pub const MIN_CROP_PX: f64 = 50.0;

/// Hard ceiling for user-requested zoom.
pub const MAX_MANUAL_ZOOM: f64 = 10.0;

/// Ceiling for zoom derived from a detector suggestion. More conservative
/// than [`MAX_MANUAL_ZOOM`]; the two are independent knobs, not one.
pub const MAX_AUTO_ZOOM: f64 = 5.0;

/// Normalized, resolution-independent description of a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Framing {
    /// Normalized horizontal position of the crop center, `[0, 1]`.
    pub center_x: f64,
    /// Normalized vertical position of the crop center, `[0, 1]`.
    pub center_y: f64,
    /// Zoom factor, `>= 1`. 1 = fit.
    pub zoom: f64,
    /// Width/height ratio the crop must satisfy.
    pub target_aspect: f64,
    /// Content fingerprint used to recall this framing across sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Framing {
    /// The default framing: centered fit at the given aspect.
    pub fn fit(target_aspect: f64) -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.5,
            zoom: 1.0,
            target_aspect,
            fingerprint: None,
        }
    }

    /// Copy this framing to a (possibly different) target aspect.
    ///
    /// Center and zoom carry over verbatim — relative framing, not absolute
    /// pixel framing, is what is semantically "the same crop" across
    /// differently sized sources. Only the aspect is replaced.
    pub fn with_target_aspect(&self, target_aspect: f64) -> Self {
        Self {
            target_aspect,
            ..self.clone()
        }
    }
}

/// Salient region suggested by a detector, in source pixels.
///
/// Produced for a specific (image, target width, target height) triple and
/// immutable once produced; a change of target dimensions supersedes it with
/// a fresh detection rather than mutating it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalientRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

/// Exact crop rectangle in source pixels, unrounded.
///
/// The unrounded form is what display-scaled overlays should consume, so
/// interactive adjustments don't accumulate rounding drift. Rasterization
/// consumes [`CropRect::rounded`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    /// Round to integer pixels for rasterization.
    ///
    /// The rectangle's edges are rounded rather than its dimensions:
    /// rounding is monotone, so a rect inside the source is still inside
    /// after rounding (independent rounding of `x` and `width` could land
    /// one pixel past the far edge).
    pub fn rounded(&self) -> PixelRect {
        let x0 = self.x.round().max(0.0) as u32;
        let y0 = self.y.round().max(0.0) as u32;
        let x1 = (self.x + self.width).round().max(0.0) as u32;
        let y1 = (self.y + self.height).round().max(0.0) as u32;
        PixelRect {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Integer-pixel rectangle handed to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest rectangle of `target_aspect` that fits entirely inside a
/// `img_w` × `img_h` source. This is the zoom=1 ("fit") crop size.
fn base_rect(img_w: f64, img_h: f64, target_aspect: f64) -> (f64, f64) {
    let image_aspect = img_w / img_h;
    if target_aspect >= image_aspect {
        // Target is wider than the source: width-bound.
        (img_w, img_w / target_aspect)
    } else {
        // Target is taller: height-bound.
        (img_h * target_aspect, img_h)
    }
}

/// Derive the exact source-pixel crop rectangle for a framing.
///
/// The rectangle always satisfies `0 <= x`, `x + width <= img_w` (and the
/// same vertically) for any `zoom >= 1`, because the crop never exceeds the
/// fit size and the position is clamped into bounds.
pub fn calculate_crop(img_w: u32, img_h: u32, framing: &Framing) -> CropRect {
    let (w, h) = (img_w as f64, img_h as f64);
    let (base_w, base_h) = base_rect(w, h, framing.target_aspect);

    let crop_w = base_w / framing.zoom.max(1.0);
    let crop_h = base_h / framing.zoom.max(1.0);

    let x = (framing.center_x * w - crop_w / 2.0).clamp(0.0, (w - crop_w).max(0.0));
    let y = (framing.center_y * h - crop_h / 2.0).clamp(0.0, (h - crop_h).max(0.0));

    CropRect {
        x,
        y,
        width: crop_w,
        height: crop_h,
    }
}

/// Clamp a normalized center so the crop of the given pixel size stays
/// entirely inside the source.
///
/// Centers produced here make the position clamp in [`calculate_crop`] a
/// no-op, which is what makes drag operations idempotent. Idempotent by
/// construction: the output is always inside the valid range, so a second
/// application returns it unchanged.
pub fn clamp_center(
    img_w: u32,
    img_h: u32,
    crop_w: f64,
    crop_h: f64,
    center_x: f64,
    center_y: f64,
) -> (f64, f64) {
    (
        clamp_axis(center_x, crop_w, img_w as f64),
        clamp_axis(center_y, crop_h, img_h as f64),
    )
}

fn clamp_axis(center: f64, crop_dim: f64, img_dim: f64) -> f64 {
    if img_dim <= 0.0 {
        return 0.5;
    }
    let half = (crop_dim / (2.0 * img_dim)).min(0.5);
    center.clamp(half, 1.0 - half)
}

/// Zoom level at which the crop's smaller dimension reaches [`MIN_CROP_PX`],
/// capped at [`MAX_MANUAL_ZOOM`].
pub fn max_zoom(img_w: u32, img_h: u32, target_aspect: f64) -> f64 {
    let (base_w, base_h) = base_rect(img_w as f64, img_h as f64, target_aspect);
    (base_w / MIN_CROP_PX)
        .min(base_h / MIN_CROP_PX)
        .min(MAX_MANUAL_ZOOM)
}

/// Clamp a requested zoom into `[1, max_zoom]` for this image and aspect.
pub fn clamp_zoom(zoom: f64, img_w: u32, img_h: u32, target_aspect: f64) -> f64 {
    zoom.clamp(1.0, max_zoom(img_w, img_h, target_aspect).max(1.0))
}

/// Convert a detector suggestion into a framing.
///
/// The center is the region's normalized center; the zoom is the level at
/// which the crop exactly covers the suggested region on its tighter axis,
/// clamped to `[1,` [`MAX_AUTO_ZOOM`]`]` so automation never produces an
/// extreme crop. The per-image [`max_zoom`] bound applies here too: a
/// suggested framing must honor the same crop floor a manual one does.
pub fn framing_from_region(
    region: &SalientRegion,
    img_w: u32,
    img_h: u32,
    target_aspect: f64,
) -> Framing {
    let (w, h) = (img_w as f64, img_h as f64);
    let (base_w, base_h) = base_rect(w, h, target_aspect);
    let zoom_cap = MAX_AUTO_ZOOM.min(max_zoom(img_w, img_h, target_aspect)).max(1.0);

    let center_x = if w > 0.0 {
        (region.x + region.width / 2.0) / w
    } else {
        0.5
    };
    let center_y = if h > 0.0 {
        (region.y + region.height / 2.0) / h
    } else {
        0.5
    };

    let zoom = (base_w / region.width)
        .min(base_h / region.height)
        .clamp(1.0, zoom_cap);

    Framing {
        center_x: center_x.clamp(0.0, 1.0),
        center_y: center_y.clamp(0.0, 1.0),
        zoom,
        target_aspect,
        fingerprint: None,
    }
}
