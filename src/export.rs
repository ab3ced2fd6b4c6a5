//! Batch rasterization: crop, resize, encode, write.
//!
//! Export renders every image in the collection through its framing at the
//! configured export dimensions and writes the results to a directory,
//! numbered `{prefix}{start_index + position}{suffix}.{ext}` in collection
//! order.
//!
//! Per-image failures are isolated: a crop that cannot be encoded or
//! written is recorded in the report and the batch continues. Only
//! batch-level preconditions (empty collection, unwritable output
//! directory) abort the run.

use crate::collection::ImageId;
use crate::geometry::{self, Framing};
use crate::settings::{ExportSettings, OutputFormat};
use crate::workspace::Workspace;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no images to export")]
    NoImagesToExport,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One successfully written output file.
pub struct ExportedFile {
    pub id: ImageId,
    pub source_name: String,
    pub output: PathBuf,
}

/// One image that could not be exported. The rest of the batch is
/// unaffected.
pub struct ExportFailure {
    pub id: ImageId,
    pub source_name: String,
    pub reason: String,
}

#[derive(Default)]
pub struct ExportReport {
    pub written: Vec<ExportedFile>,
    pub failures: Vec<ExportFailure>,
}

/// Rasterize one image through its framing: crop the source rectangle,
/// then resample to the exact export dimensions.
pub fn render_crop(
    pixels: &DynamicImage,
    framing: &Framing,
    out_width: u32,
    out_height: u32,
) -> DynamicImage {
    let rect = geometry::calculate_crop(pixels.width(), pixels.height(), framing).rounded();
    pixels
        .crop_imm(rect.x, rect.y, rect.width.max(1), rect.height.max(1))
        .resize_exact(out_width, out_height, FilterType::Lanczos3)
}

/// Encode and write one rendered crop, format and quality per settings.
fn write_output(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), String> {
    let file = std::fs::File::create(path).map_err(|e| e.to_string())?;
    let writer = std::io::BufWriter::new(file);
    let result = match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(writer, quality as u8))
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(writer)),
        OutputFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(writer))
        }
    };
    result.map_err(|e| e.to_string())
}

/// Export every image in the collection to `output_dir`.
///
/// `progress` fires once per image after its file is written (or its
/// failure recorded), with `(completed, total)`. Each image's processing
/// flag is set for the duration of its own rasterization.
pub fn export_all<F>(
    workspace: &mut Workspace,
    output_dir: &Path,
    mut progress: F,
) -> Result<ExportReport, ExportError>
where
    F: FnMut(usize, usize),
{
    if workspace.collection().is_empty() {
        return Err(ExportError::NoImagesToExport);
    }
    std::fs::create_dir_all(output_dir)?;

    let export: ExportSettings = workspace.settings().export.clone();
    // Snapshot identity, pixels, and framing up front; the pixel handles
    // are shared, not copied.
    let plan: Vec<(ImageId, String, Arc<DynamicImage>, Framing)> = workspace
        .collection()
        .entries()
        .iter()
        .map(|e| (e.id, e.name.clone(), Arc::clone(&e.pixels), e.framing.clone()))
        .collect();
    let total = plan.len();

    let mut report = ExportReport::default();
    for (position, (id, name, pixels, framing)) in plan.into_iter().enumerate() {
        let output = output_dir.join(export.filename(position));

        workspace.collection_mut().set_processing(id, true).ok();
        let rendered = render_crop(&pixels, &framing, export.width, export.height);
        let result = write_output(&rendered, &output, export.format, export.quality.value());
        workspace.collection_mut().set_processing(id, false).ok();

        match result {
            Ok(()) => {
                debug!("wrote {}", output.display());
                report.written.push(ExportedFile {
                    id,
                    source_name: name,
                    output,
                });
            }
            Err(reason) => {
                warn!("export failed for {name}: {reason}");
                report.failures.push(ExportFailure {
                    id,
                    source_name: name,
                    reason,
                });
            }
        }
        progress(position + 1, total);
    }

    Ok(report)
}
