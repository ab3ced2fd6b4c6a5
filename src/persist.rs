//! Best-effort persistence of settings and per-fingerprint framings.
//!
//! The store is a directory holding two versioned JSON files:
//!
//! - `settings.json` — the global [`Settings`] block
//! - `framings.json` — content fingerprint → [`Framing`], so the framing a
//!   user chose for an image is recalled across sessions for the same
//!   source content regardless of filename
//!
//! Every operation is best-effort. Loads that fail for any reason — missing
//! file, unreadable JSON, version mismatch — are logged and reported as "no
//! persisted data"; saves log and swallow their errors. Callers treat
//! absence uniformly whether it came from "never saved" or "save failed":
//! persistence failure is never fatal and never distinguishable from a cold
//! start.

use crate::geometry::Framing;
use crate::settings::Settings;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";
const FRAMINGS_FILENAME: &str = "framings.json";

/// Version of the store file format. Bump to invalidate existing stores
/// when the schema or framing semantics change.
const STORE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SettingsFile {
    version: u32,
    settings: Settings,
}

#[derive(Serialize, Deserialize)]
struct FramingsFile {
    version: u32,
    framings: HashMap<String, Framing>,
}

/// Handle to the on-disk store directory.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load persisted settings, or `None` for a cold start.
    pub fn load_settings(&self) -> Option<Settings> {
        let file: SettingsFile = self.read_json(SETTINGS_FILENAME)?;
        if file.version != STORE_VERSION {
            debug!(
                "settings store version {} != {}; ignoring",
                file.version, STORE_VERSION
            );
            return None;
        }
        Some(file.settings)
    }

    /// Persist settings. Failures are logged and swallowed.
    pub fn save_settings(&self, settings: &Settings) {
        self.write_json(
            SETTINGS_FILENAME,
            &SettingsFile {
                version: STORE_VERSION,
                settings: settings.clone(),
            },
        );
    }

    /// Load the fingerprint → framing map, empty for a cold start.
    pub fn load_framings(&self) -> HashMap<String, Framing> {
        match self.read_json::<FramingsFile>(FRAMINGS_FILENAME) {
            Some(file) if file.version == STORE_VERSION => file.framings,
            Some(file) => {
                debug!(
                    "framings store version {} != {}; ignoring",
                    file.version, STORE_VERSION
                );
                HashMap::new()
            }
            None => HashMap::new(),
        }
    }

    /// Persist the fingerprint → framing map. Failures are logged and
    /// swallowed.
    pub fn save_framings(&self, framings: &HashMap<String, Framing>) {
        self.write_json(
            FRAMINGS_FILENAME,
            &FramingsFile {
                version: STORE_VERSION,
                framings: framings.clone(),
            },
        );
    }

    /// Remove all persisted state. Best-effort.
    pub fn clear_all(&self) {
        for filename in [SETTINGS_FILENAME, FRAMINGS_FILENAME] {
            let path = self.dir.join(filename);
            if path.exists()
                && let Err(e) = std::fs::remove_file(&path)
            {
                warn!("could not remove {}: {e}", path.display());
            }
        }
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, filename: &str) -> Option<T> {
        let path = self.dir.join(filename);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("could not read {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("could not parse {}: {e}", path.display());
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, filename: &str, value: &T) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("could not create store dir {}: {e}", self.dir.display());
            return;
        }
        let path = self.dir.join(filename);
        let json = match serde_json::to_string_pretty(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("could not serialize {}: {e}", path.display());
                return;
            }
        };
        if let Err(e) = std::fs::write(&path, json) {
            warn!("could not write {}: {e}", path.display());
        }
    }
}
