//! Source-image loading: decode, orientation-normalize, fingerprint, preview.
//!
//! All geometry downstream assumes width/height are display-correct, so the
//! loader applies any embedded EXIF orientation to the pixel buffer before
//! reporting dimensions. The content fingerprint is a SHA-256 of the file
//! bytes — content-based rather than path-based so a renamed or moved file
//! recalls the same persisted framing. Collisions are an accepted risk;
//! the fingerprint is a lookup key, not a security boundary.

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

/// Longer edge of the cached low-resolution preview.
const PREVIEW_EDGE: u32 = 480;

/// Extensions whose decoders are compiled in.
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode {path}: {reason}")]
    DecodeFailed { path: PathBuf, reason: String },
    #[error("invalid image {path}: zero dimensions ({width}x{height})")]
    InvalidImage {
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

/// A decoded, orientation-normalized source image ready for the collection.
pub struct LoadedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<DynamicImage>,
    pub preview: Arc<DynamicImage>,
    pub fingerprint: String,
}

/// Returns the set of image file extensions with working decoders.
pub fn supported_input_extensions() -> &'static [&'static str] {
    SUPPORTED_EXTENSIONS
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| ext.eq_ignore_ascii_case(s))
        })
}

/// Expand a mixed list of files and directories into supported image files.
///
/// Directories are walked recursively; entries are returned in sorted order
/// so batch numbering is deterministic. Explicitly named files are kept even
/// without a recognized extension — the decode step is the arbiter then.
pub fn collect_image_files(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_file() && is_supported(entry.path()) {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// SHA-256 hash of a byte buffer, as a hex string.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Decode a source file, normalize its orientation, and fingerprint it.
///
/// The reported dimensions are post-orientation (a rotated portrait JPEG
/// loads as portrait), and the returned pixel handle is immutable — shared
/// read-only with analysis and export from here on.
pub fn load_and_normalize(path: &Path) -> Result<LoadedImage, LoadError> {
    let bytes = std::fs::read(path)?;
    let fingerprint = fingerprint_bytes(&bytes);

    let reader = ImageReader::new(std::io::Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| LoadError::DecodeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    let mut decoder = reader.into_decoder().map_err(|e| LoadError::DecodeFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let mut pixels =
        DynamicImage::from_decoder(decoder).map_err(|e| LoadError::DecodeFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    pixels.apply_orientation(orientation);

    let (width, height) = (pixels.width(), pixels.height());
    if width == 0 || height == 0 {
        return Err(LoadError::InvalidImage {
            path: path.to_path_buf(),
            width,
            height,
        });
    }

    let preview = pixels.thumbnail(PREVIEW_EDGE, PREVIEW_EDGE);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(LoadedImage {
        name,
        width,
        height,
        pixels: Arc::new(pixels),
        preview: Arc::new(preview),
        fingerprint,
    })
}
