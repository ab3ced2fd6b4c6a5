//! Global workspace settings: auto-detection, grid overlay, export parameters.
//!
//! Settings round-trip through [`crate::persist`] as JSON, so everything here
//! derives serde and fills in defaults for fields absent from older store
//! files. The grid overlay carries no behavior in this crate — it is user
//! preference state that persists so a presentation surface can honor it.

use serde::{Deserialize, Serialize};

/// Lossy encoding quality (1–100). Clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Output encoding for exported crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GridStyle {
    /// Rule-of-thirds lines.
    Thirds,
    /// Golden-ratio lines.
    Golden,
}

/// Crop-guide overlay preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridOverlay {
    pub enabled: bool,
    pub style: GridStyle,
}

impl Default for GridOverlay {
    fn default() -> Self {
        Self {
            enabled: true,
            style: GridStyle::Thirds,
        }
    }
}

/// Export parameters: target dimensions, encoding, and output naming.
///
/// Output filenames follow `{prefix}{start_index + position}{suffix}.{ext}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
    pub prefix: String,
    pub suffix: String,
    pub start_index: u32,
}

impl ExportSettings {
    /// Width/height ratio every framing in the collection targets.
    pub fn target_aspect(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Output filename for the image at `position` in the collection.
    pub fn filename(&self, position: usize) -> String {
        format!(
            "{}{}{}.{}",
            self.prefix,
            self.start_index as usize + position,
            self.suffix,
            self.format.extension()
        )
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1080,
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
            prefix: String::new(),
            suffix: String::new(),
            start_index: 1,
        }
    }
}

/// The full global settings block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run saliency detection automatically for newly added images that
    /// have no persisted framing.
    pub auto_detect: bool,
    pub grid: GridOverlay,
    pub export: ExportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_detect: true,
            grid: GridOverlay::default(),
            export: ExportSettings::default(),
        }
    }
}
