//! Built-in saliency detector — gradient energy + local variance.
//!
//! The detector works on a downscaled luma copy of the source:
//!
//! 1. Resize so the longer edge is at most [`ANALYSIS_EDGE`] pixels.
//! 2. Per pixel, combine gradient magnitude (edge strength) with local 3×3
//!    variance (texture) into a saliency score.
//! 3. Slide windows of the target aspect over an integral image of the
//!    saliency map at a few zoom scales, keeping the window with the highest
//!    mean saliency relative to the whole image.
//! 4. Map the winning window back to source pixels.
//!
//! The output region is a *suggestion*: the geometry model converts it into
//! a framing and caps the implied zoom (see
//! [`crate::geometry::framing_from_region`]).

use super::{DetectError, SaliencyDetector};
use crate::geometry::SalientRegion;
use image::DynamicImage;
use image::imageops::{self, FilterType};

/// Longer edge of the internal analysis buffer. Saliency is scale-tolerant,
/// so analyzing a small copy is dramatically cheaper with near-identical
/// window placement.
const ANALYSIS_EDGE: u32 = 256;

/// Candidate window sizes as fractions of the fit ("zoom 1") crop.
/// Corresponds to suggested zooms of 1.25x, 1.6x and 2x.
const WINDOW_SCALES: &[f64] = &[0.8, 0.625, 0.5];

/// Relative weights of edge strength versus local variance.
const EDGE_WEIGHT: f32 = 0.6;
const VARIANCE_WEIGHT: f32 = 0.4;

/// Built-in gradient/variance saliency detector.
#[derive(Debug, Default, Clone, Copy)]
pub struct EdgeDetector;

impl EdgeDetector {
    pub fn new() -> Self {
        Self
    }
}

impl SaliencyDetector for EdgeDetector {
    fn detect(
        &self,
        image: &DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> Result<SalientRegion, DetectError> {
        let (src_w, src_h) = (image.width(), image.height());
        if src_w < 8 || src_h < 8 {
            return Err(DetectError::ImageTooSmall(src_w, src_h));
        }
        if target_width == 0 || target_height == 0 {
            return Err(DetectError::Failed(
                "target dimensions must be non-zero".to_string(),
            ));
        }
        let target_aspect = target_width as f64 / target_height as f64;

        // Work on a small luma copy.
        let longer = src_w.max(src_h);
        let scale = (longer as f64 / ANALYSIS_EDGE as f64).max(1.0);
        let small_w = ((src_w as f64 / scale).round() as u32).max(2);
        let small_h = ((src_h as f64 / scale).round() as u32).max(2);
        let gray = imageops::resize(&image.to_luma8(), small_w, small_h, FilterType::Triangle);

        let saliency = saliency_map(&gray, small_w, small_h);
        let integral = integral_image(&saliency, small_w as usize, small_h as usize);
        let total: f64 = rect_sum(&integral, small_w as usize, 0, 0, small_w as usize, small_h as usize);
        let global_mean = total / (small_w as f64 * small_h as f64);

        // Fit crop of the target aspect inside the analysis buffer.
        let image_aspect = small_w as f64 / small_h as f64;
        let (base_w, base_h) = if target_aspect >= image_aspect {
            (small_w as f64, small_w as f64 / target_aspect)
        } else {
            (small_h as f64 * target_aspect, small_h as f64)
        };

        let mut best: Option<(f64, usize, usize, usize, usize)> = None;
        for &frac in WINDOW_SCALES {
            let win_w = ((base_w * frac).round() as usize).clamp(1, small_w as usize);
            let win_h = ((base_h * frac).round() as usize).clamp(1, small_h as usize);
            let step_x = (win_w / 8).max(1);
            let step_y = (win_h / 8).max(1);

            let mut y = 0;
            while y + win_h <= small_h as usize {
                let mut x = 0;
                while x + win_w <= small_w as usize {
                    let sum = rect_sum(&integral, small_w as usize, x, y, win_w, win_h);
                    let mean = sum / (win_w as f64 * win_h as f64);
                    if best.is_none_or(|(score, ..)| mean > score) {
                        best = Some((mean, x, y, win_w, win_h));
                    }
                    x += step_x;
                }
                y += step_y;
            }
        }

        let (best_mean, x, y, win_w, win_h) =
            best.ok_or_else(|| DetectError::Failed("no candidate window fits".to_string()))?;

        // Confidence: how much the winning window stands out from the
        // image-wide mean. A featureless image scores near zero.
        let confidence = if best_mean > 0.0 {
            (1.0 - global_mean / best_mean).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let upscale = src_w as f64 / small_w as f64;
        Ok(SalientRegion {
            x: x as f64 * upscale,
            y: y as f64 * (src_h as f64 / small_h as f64),
            width: (win_w as f64 * upscale).min(src_w as f64),
            height: (win_h as f64 * (src_h as f64 / small_h as f64)).min(src_h as f64),
            confidence,
        })
    }
}

/// Per-pixel saliency: gradient magnitude blended with 3×3 local variance.
fn saliency_map(gray: &image::GrayImage, width: u32, height: u32) -> Vec<f32> {
    let mut map = vec![0.0f32; (width * height) as usize];

    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            let px = |dx: i32, dy: i32| {
                gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i32
            };

            let gx = (px(1, 0) - px(-1, 0)).abs();
            let gy = (px(0, 1) - px(0, -1)).abs();
            let edge = ((gx * gx + gy * gy) as f32).sqrt();

            let mut sum = 0i32;
            let mut sum_sq = 0i64;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let v = px(dx, dy);
                    sum += v;
                    sum_sq += (v * v) as i64;
                }
            }
            let mean = sum as f32 / 9.0;
            let variance = (sum_sq as f32 / 9.0 - mean * mean).max(0.0);

            map[(y * width + x) as usize] = edge * EDGE_WEIGHT + variance.sqrt() * VARIANCE_WEIGHT;
        }
    }

    map
}

/// Summed-area table with a zero row/column of padding.
fn integral_image(map: &[f32], width: usize, height: usize) -> Vec<f64> {
    let stride = width + 1;
    let mut integral = vec![0.0f64; stride * (height + 1)];
    for y in 0..height {
        let mut row_sum = 0.0f64;
        for x in 0..width {
            row_sum += map[y * width + x] as f64;
            integral[(y + 1) * stride + (x + 1)] = integral[y * stride + (x + 1)] + row_sum;
        }
    }
    integral
}

/// Sum of the `w`×`h` window at `(x, y)` in O(1) via the integral image.
fn rect_sum(integral: &[f64], width: usize, x: usize, y: usize, w: usize, h: usize) -> f64 {
    let stride = width + 1;
    integral[(y + h) * stride + (x + w)] + integral[y * stride + x]
        - integral[y * stride + (x + w)]
        - integral[(y + h) * stride + x]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    /// Gray canvas with a high-contrast checkerboard patch.
    fn image_with_feature(w: u32, h: u32, fx: u32, fy: u32, fsize: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(w, h, Rgb([128, 128, 128]));
        for y in fy..(fy + fsize).min(h) {
            for x in fx..(fx + fsize).min(w) {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                img.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    // =========================================================================
    // Region placement
    // =========================================================================

    #[test]
    fn finds_feature_in_flat_image() {
        let img = image_with_feature(400, 300, 280, 40, 60);
        let region = EdgeDetector::new().detect(&img, 100, 100).unwrap();

        // The feature center should fall inside the suggested region.
        let (cx, cy) = (310.0, 70.0);
        assert!(region.x <= cx && cx <= region.x + region.width, "{region:?}");
        assert!(region.y <= cy && cy <= region.y + region.height, "{region:?}");
    }

    #[test]
    fn region_stays_within_source_bounds() {
        let img = image_with_feature(500, 200, 10, 10, 50);
        let region = EdgeDetector::new().detect(&img, 200, 300).unwrap();
        assert!(region.x >= 0.0 && region.y >= 0.0);
        assert!(region.x + region.width <= 500.0 + 1e-6);
        assert!(region.y + region.height <= 200.0 + 1e-6);
    }

    #[test]
    fn featureless_image_has_low_confidence() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 200, Rgb([90, 90, 90])));
        let region = EdgeDetector::new().detect(&img, 100, 100).unwrap();
        assert!(region.confidence < 0.2, "confidence {}", region.confidence);
    }

    #[test]
    fn textured_feature_has_higher_confidence_than_flat() {
        let flat = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 300, Rgb([90, 90, 90])));
        let featured = image_with_feature(300, 300, 120, 120, 60);
        let detector = EdgeDetector::new();
        let flat_conf = detector.detect(&flat, 100, 100).unwrap().confidence;
        let feat_conf = detector.detect(&featured, 100, 100).unwrap().confidence;
        assert!(feat_conf > flat_conf);
    }

    // =========================================================================
    // Preconditions
    // =========================================================================

    #[test]
    fn tiny_image_rejected() {
        let img = DynamicImage::new_rgb8(4, 4);
        assert!(matches!(
            EdgeDetector::new().detect(&img, 100, 100),
            Err(DetectError::ImageTooSmall(4, 4))
        ));
    }

    #[test]
    fn zero_target_rejected() {
        let img = DynamicImage::new_rgb8(100, 100);
        assert!(EdgeDetector::new().detect(&img, 0, 100).is_err());
    }

    // =========================================================================
    // Internals
    // =========================================================================

    #[test]
    fn integral_image_rect_sums() {
        // 2x2 map of ones: any window sum equals its area.
        let map = vec![1.0f32; 4];
        let integral = integral_image(&map, 2, 2);
        assert_eq!(rect_sum(&integral, 2, 0, 0, 2, 2), 4.0);
        assert_eq!(rect_sum(&integral, 2, 1, 0, 1, 2), 2.0);
        assert_eq!(rect_sum(&integral, 2, 1, 1, 1, 1), 1.0);
    }

    #[test]
    fn saliency_zero_on_flat_input() {
        let gray = image::GrayImage::from_pixel(16, 16, Luma([100]));
        let map = saliency_map(&gray, 16, 16);
        assert!(map.iter().all(|&v| v == 0.0));
    }
}
