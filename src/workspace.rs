//! Session orchestration: the collection, the analyzer, settings, and the
//! persistence store wired together.
//!
//! [`Workspace`] owns the authoritative [`Collection`] and is the only
//! component that mutates it. Asynchronous analysis is reconciled here:
//! adding an image schedules at most one job (auto-detect on, no persisted
//! framing), the job carries an immutable snapshot of identity and target
//! dimensions, and commit time looks the entry up again — a removal that
//! raced the job makes the late result a silent no-op.
//!
//! Two orchestration rules from the interaction model live here:
//!
//! - **Add**: persisted framing wins over detection; detection is scheduled
//!   only when auto-detect is enabled and the fingerprint is unknown.
//! - **Target-dimension change**: framings re-target synchronously (cheap:
//!   only the aspect changes); cached saliency is invalidated when
//!   auto-detect is on, but re-analysis only happens through an explicit
//!   batch call — editing a number field never silently spawns background
//!   work across the whole collection.

use crate::analysis::{Analyzer, AnalysisJob, AnalysisStats};
use crate::collection::{Collection, CollectionError, ImageId, NewImage};
use crate::detect::SaliencyDetector;
use crate::geometry::{self, Framing};
use crate::loader::{self, LoadError};
use crate::persist::Store;
use crate::settings::Settings;
use log::{debug, info};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of adding a batch of files: what made it in, what was skipped.
/// Per-file decode failures are isolated; they never abort the batch.
#[derive(Default)]
pub struct AddReport {
    pub added: Vec<ImageId>,
    pub skipped: Vec<(PathBuf, LoadError)>,
}

pub struct Workspace {
    collection: Collection,
    analyzer: Analyzer,
    settings: Settings,
    store: Store,
    saved_framings: HashMap<String, Framing>,
    queued_jobs: Vec<AnalysisJob>,
}

impl Workspace {
    /// Open a workspace against a persistence store. Persisted settings and
    /// framings load best-effort; a cold or broken store means defaults.
    pub fn open(store: Store, detector: Arc<dyn SaliencyDetector>, concurrency: usize) -> Self {
        let settings = store.load_settings().unwrap_or_default();
        let saved_framings = store.load_framings();
        if !saved_framings.is_empty() {
            debug!("recalled {} persisted framings", saved_framings.len());
        }
        Self {
            collection: Collection::new(),
            analyzer: Analyzer::new(detector, concurrency),
            settings,
            store,
            saved_framings,
            queued_jobs: Vec::new(),
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub(crate) fn collection_mut(&mut self) -> &mut Collection {
        &mut self.collection
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn analysis_stats(&self) -> AnalysisStats {
        self.analyzer.stats()
    }

    /// Number of scheduled-but-unresolved analysis jobs.
    pub fn queued_analysis(&self) -> usize {
        self.queued_jobs.len()
    }

    /// Replace the settings block, applying the target-dimension change
    /// rule when export width/height differ, and persist the result.
    pub fn apply_settings(&mut self, settings: Settings) {
        let old = (self.settings.export.width, self.settings.export.height);
        let new = (settings.export.width, settings.export.height);
        self.settings = settings;
        if old != new {
            self.handle_target_dimension_change();
        }
        self.store.save_settings(&self.settings);
    }

    /// Change the global export dimensions.
    pub fn set_target_dimensions(&mut self, width: u32, height: u32) {
        if (self.settings.export.width, self.settings.export.height) == (width, height) {
            return;
        }
        self.settings.export.width = width;
        self.settings.export.height = height;
        self.handle_target_dimension_change();
        self.store.save_settings(&self.settings);
    }

    fn handle_target_dimension_change(&mut self) {
        // Synchronous and cheap: center/zoom are resolution-relative.
        self.collection
            .rescale_all_framings(self.settings.export.target_aspect());
        if self.settings.auto_detect {
            // Old suggestions were computed for stale dimensions.
            self.analyzer.clear_cache();
        }
    }

    // -------------------------------------------------------------------------
    // Adding and removing images
    // -------------------------------------------------------------------------

    /// Load files into the collection. For each image: a persisted framing
    /// matching its fingerprint is applied (re-targeted to the current
    /// export aspect); otherwise the default fit framing is used and — with
    /// auto-detect on — exactly one analysis job is scheduled, with the
    /// pending flag set before the job can start.
    pub fn add_files(&mut self, paths: &[PathBuf]) -> AddReport {
        let mut report = AddReport::default();
        let aspect = self.settings.export.target_aspect();

        for path in paths {
            let loaded = match loader::load_and_normalize(path) {
                Ok(loaded) => loaded,
                Err(e) => {
                    info!("skipping {}: {e}", path.display());
                    report.skipped.push((path.clone(), e));
                    continue;
                }
            };

            let saved = self.saved_framings.get(&loaded.fingerprint).cloned();
            let framing = match &saved {
                Some(framing) => Framing {
                    fingerprint: Some(loaded.fingerprint.clone()),
                    ..framing.with_target_aspect(aspect)
                },
                None => Framing {
                    fingerprint: Some(loaded.fingerprint.clone()),
                    ..Framing::fit(aspect)
                },
            };

            let pixels = Arc::clone(&loaded.pixels);
            let ids = self.collection.add_images(vec![NewImage {
                name: loaded.name,
                width: loaded.width,
                height: loaded.height,
                pixels: Arc::clone(&loaded.pixels),
                preview: loaded.preview,
                framing,
            }]);
            let id = ids[0];
            report.added.push(id);

            if saved.is_none() && self.settings.auto_detect {
                // Pending is set before the job is admitted anywhere.
                self.collection.set_analysis_pending(id, true).ok();
                self.queued_jobs.push(AnalysisJob {
                    id,
                    pixels,
                    target_width: self.settings.export.width,
                    target_height: self.settings.export.height,
                });
            }
        }

        report
    }

    /// Remove an image: its cache entries are invalidated, queued jobs for
    /// it are dropped, and its pixel handle is released once no in-flight
    /// worker still holds the `Arc`.
    pub fn remove_image(&mut self, id: ImageId) -> Result<(), CollectionError> {
        self.collection.remove_image(id)?;
        self.analyzer.invalidate_image(id);
        self.queued_jobs.retain(|job| job.id != id);
        Ok(())
    }

    /// Reset the workspace: empty collection, cleared pointers, full cache
    /// invalidation.
    pub fn clear(&mut self) {
        self.collection.clear_all();
        self.analyzer.clear_cache();
        self.queued_jobs.clear();
    }

    // -------------------------------------------------------------------------
    // Framing updates
    // -------------------------------------------------------------------------

    /// Replace one image's framing with the zoom clamped for that image,
    /// and persist it under the image's fingerprint.
    pub fn update_framing(
        &mut self,
        id: ImageId,
        mut framing: Framing,
    ) -> Result<(), CollectionError> {
        let entry = self
            .collection
            .get(id)
            .ok_or(CollectionError::NoSuchImage(id))?;
        framing.zoom =
            geometry::clamp_zoom(framing.zoom, entry.width, entry.height, framing.target_aspect);
        framing.fingerprint = entry.framing.fingerprint.clone();
        self.collection.update_framing(id, framing)?;
        self.persist_framing(id);
        Ok(())
    }

    /// Apply one framing's center/zoom to every image, aspect forced to the
    /// current export aspect, and persist the result for all of them.
    pub fn copy_framing_to_all(&mut self, framing: &Framing) {
        self.collection
            .copy_framing_to_all(framing, self.settings.export.target_aspect());
        self.persist_all_framings();
    }

    fn persist_framing(&mut self, id: ImageId) {
        if let Some(entry) = self.collection.get(id)
            && let Some(fp) = entry.framing.fingerprint.clone()
        {
            self.saved_framings.insert(fp, entry.framing.clone());
            self.store.save_framings(&self.saved_framings);
        }
    }

    pub(crate) fn persist_all_framings(&mut self) {
        for entry in self.collection.entries() {
            if let Some(fp) = entry.framing.fingerprint.clone() {
                self.saved_framings.insert(fp, entry.framing.clone());
            }
        }
        self.store.save_framings(&self.saved_framings);
    }

    // -------------------------------------------------------------------------
    // Analysis
    // -------------------------------------------------------------------------

    /// Run all queued analysis jobs with the configured concurrency ceiling
    /// and commit the outcomes. For each completed job the result and the
    /// derived framing land in one transition; entries removed while their
    /// job was in flight are skipped without error.
    ///
    /// Returns the number of images whose framing was updated.
    pub fn run_queued_analysis<F>(&mut self, progress: F) -> usize
    where
        F: FnMut(usize, usize),
    {
        let jobs = std::mem::take(&mut self.queued_jobs);
        self.run_jobs(jobs, progress)
    }

    /// Explicit batch re-analysis of every image in the collection. This is
    /// the only path that re-runs detection after a target-dimension
    /// change.
    pub fn reanalyze_all<F>(&mut self, progress: F) -> usize
    where
        F: FnMut(usize, usize),
    {
        self.queued_jobs.clear();
        let jobs: Vec<AnalysisJob> = self
            .collection
            .entries()
            .iter()
            .map(|entry| AnalysisJob {
                id: entry.id,
                pixels: Arc::clone(&entry.pixels),
                target_width: self.settings.export.width,
                target_height: self.settings.export.height,
            })
            .collect();
        for job in &jobs {
            self.collection.set_analysis_pending(job.id, true).ok();
        }
        self.run_jobs(jobs, progress)
    }

    fn run_jobs<F>(&mut self, jobs: Vec<AnalysisJob>, progress: F) -> usize
    where
        F: FnMut(usize, usize),
    {
        if jobs.is_empty() {
            return 0;
        }
        let outcomes = self.analyzer.run_batch(jobs, progress);
        let aspect = self.settings.export.target_aspect();

        let mut committed = 0;
        for outcome in outcomes {
            // Commit-time lookup: the entry may be gone by now.
            let Some(entry) = self.collection.get(outcome.id) else {
                debug!("discarding late analysis result for removed image {:?}", outcome.id);
                continue;
            };
            match outcome.region {
                Some(region) => {
                    let framing = Framing {
                        fingerprint: entry.framing.fingerprint.clone(),
                        ..geometry::framing_from_region(&region, entry.width, entry.height, aspect)
                    };
                    if self
                        .collection
                        .resolve_analysis(outcome.id, Some(region), Some(framing))
                    {
                        committed += 1;
                    }
                }
                None => {
                    // Detection failed: keep the fit framing, just clear
                    // the pending flag.
                    self.collection.resolve_analysis(outcome.id, None, None);
                }
            }
        }
        committed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::tests::MockDetector;
    use image::{ImageEncoder, RgbImage};
    use std::path::Path;
    use tempfile::TempDir;

    fn create_test_jpeg(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let file = std::fs::File::create(path).unwrap();
        let writer = std::io::BufWriter::new(file);
        image::codecs::jpeg::JpegEncoder::new(writer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
            .unwrap();
    }

    fn workspace_with_detector(
        store_dir: &Path,
        detector: Arc<MockDetector>,
    ) -> Workspace {
        Workspace::open(Store::new(store_dir), detector, 2)
    }

    fn add_one(workspace: &mut Workspace, dir: &Path, name: &str) -> ImageId {
        let path = dir.join(name);
        create_test_jpeg(&path, 1200, 800);
        let report = workspace.add_files(&[path]);
        assert!(report.skipped.is_empty());
        report.added[0]
    }

    // =========================================================================
    // Add orchestration
    // =========================================================================

    #[test]
    fn add_schedules_one_job_and_sets_pending() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector);

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        assert!(ws.collection().get(id).unwrap().analysis_pending);
        assert_eq!(ws.queued_analysis(), 1);
    }

    #[test]
    fn add_with_auto_detect_off_schedules_nothing() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector);
        let mut settings = ws.settings().clone();
        settings.auto_detect = false;
        ws.apply_settings(settings);

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        assert!(!ws.collection().get(id).unwrap().analysis_pending);
        assert_eq!(ws.queued_analysis(), 0);
    }

    #[test]
    fn add_applies_persisted_framing_and_skips_analysis() {
        let tmp = TempDir::new().unwrap();
        let store_dir = tmp.path().join("store");
        let detector = Arc::new(MockDetector::default());

        // First session: choose a manual framing.
        let mut ws = workspace_with_detector(&store_dir, detector.clone());
        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        ws.update_framing(
            id,
            Framing {
                center_x: 0.2,
                center_y: 0.6,
                zoom: 2.0,
                target_aspect: 1.0,
                fingerprint: None,
            },
        )
        .unwrap();

        // Second session: same content, new aspect.
        let mut ws2 = workspace_with_detector(&store_dir, detector);
        ws2.set_target_dimensions(1600, 900);
        let id2 = add_one(&mut ws2, tmp.path(), "a.jpg");

        let entry = ws2.collection().get(id2).unwrap();
        assert!(!entry.analysis_pending);
        assert_eq!(ws2.queued_analysis(), 0);
        assert_eq!((entry.framing.center_x, entry.framing.center_y), (0.2, 0.6));
        assert_eq!(entry.framing.zoom, 2.0);
        // Re-targeted to the current export aspect, not the saved one.
        assert!((entry.framing.target_aspect - 16.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn add_isolates_decode_failures() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.jpg");
        create_test_jpeg(&good, 100, 100);
        let bad = tmp.path().join("bad.jpg");
        std::fs::write(&bad, "not an image").unwrap();

        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector);
        let report = ws.add_files(&[bad.clone(), good]);

        assert_eq!(report.added.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, bad);
        assert_eq!(ws.collection().len(), 1);
    }

    // =========================================================================
    // Analysis commit
    // =========================================================================

    #[test]
    fn run_queued_commits_region_and_derived_framing() {
        let tmp = TempDir::new().unwrap();
        // Region centered at (600, 200) in a 1200x800 source.
        let detector = Arc::new(MockDetector::with_results(vec![Ok(MockDetector::region(
            500.0, 100.0, 200.0, 200.0,
        ))]));
        let mut ws = workspace_with_detector(tmp.path(), detector);

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        let committed = ws.run_queued_analysis(|_, _| {});

        assert_eq!(committed, 1);
        let entry = ws.collection().get(id).unwrap();
        assert!(!entry.analysis_pending);
        assert!(entry.salient.is_some());
        assert!((entry.framing.center_x - 0.5).abs() < 1e-9);
        assert!((entry.framing.center_y - 0.25).abs() < 1e-9);
        assert!(entry.framing.zoom > 1.0);
        // Fingerprint survives the framing replacement.
        assert!(entry.framing.fingerprint.is_some());
    }

    #[test]
    fn committed_suggestion_never_crops_below_pixel_floor() {
        let tmp = TempDir::new().unwrap();
        // A tight region on a small source: the fit base is 100x100, so
        // the image-specific zoom limit (2x) is stricter than the
        // detector cap.
        let detector = Arc::new(MockDetector::with_results(vec![Ok(MockDetector::region(
            60.0, 40.0, 10.0, 10.0,
        ))]));
        let mut ws = workspace_with_detector(tmp.path(), detector);

        let path = tmp.path().join("small.jpg");
        create_test_jpeg(&path, 150, 100);
        let report = ws.add_files(&[path]);
        ws.run_queued_analysis(|_, _| {});

        let entry = ws.collection().get(report.added[0]).unwrap();
        let rect = geometry::calculate_crop(entry.width, entry.height, &entry.framing);
        assert!(
            rect.width.min(rect.height) >= geometry::MIN_CROP_PX - 1e-9,
            "committed framing gave {rect:?}"
        );
    }

    #[test]
    fn failed_detection_falls_back_to_fit_framing() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::with_results(vec![Err("broken".to_string())]));
        let mut ws = workspace_with_detector(tmp.path(), detector);

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        let committed = ws.run_queued_analysis(|_, _| {});

        assert_eq!(committed, 0);
        let entry = ws.collection().get(id).unwrap();
        assert!(!entry.analysis_pending);
        assert!(entry.salient.is_none());
        assert_eq!((entry.framing.center_x, entry.framing.zoom), (0.5, 1.0));
    }

    #[test]
    fn removal_before_run_drops_queued_job() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector.clone());

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        ws.remove_image(id).unwrap();
        assert_eq!(ws.queued_analysis(), 0);

        let committed = ws.run_queued_analysis(|_, _| {});
        assert_eq!(committed, 0);
        assert_eq!(detector.invocation_count(), 0);
    }

    #[test]
    fn reanalysis_is_explicit_after_dimension_change() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::with_results(vec![
            Ok(MockDetector::region(0.0, 0.0, 400.0, 400.0)),
            Ok(MockDetector::region(0.0, 0.0, 400.0, 400.0)),
        ]));
        let mut ws = workspace_with_detector(tmp.path(), detector.clone());

        add_one(&mut ws, tmp.path(), "a.jpg");
        ws.run_queued_analysis(|_, _| {});
        assert_eq!(detector.invocation_count(), 1);

        // Changing dimensions alone spawns no background work...
        ws.set_target_dimensions(900, 900);
        assert_eq!(ws.queued_analysis(), 0);
        assert_eq!(detector.invocation_count(), 1);

        // ...re-analysis happens only when explicitly requested, and the
        // cache was invalidated so the detector runs again.
        ws.reanalyze_all(|_, _| {});
        assert_eq!(detector.invocation_count(), 2);
    }

    // =========================================================================
    // Target-dimension change rule
    // =========================================================================

    #[test]
    fn dimension_change_rescales_without_touching_center_or_zoom() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector);
        let mut settings = ws.settings().clone();
        settings.auto_detect = false;
        ws.apply_settings(settings);

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        ws.update_framing(
            id,
            Framing {
                center_x: 0.3,
                center_y: 0.7,
                zoom: 2.5,
                target_aspect: 1.0,
                fingerprint: None,
            },
        )
        .unwrap();

        ws.set_target_dimensions(1920, 1080);

        let framing = &ws.collection().get(id).unwrap().framing;
        assert_eq!((framing.center_x, framing.center_y, framing.zoom), (0.3, 0.7, 2.5));
        assert!((framing.target_aspect - 16.0 / 9.0).abs() < 1e-12);
    }

    // =========================================================================
    // Framing updates and zoom clamping
    // =========================================================================

    #[test]
    fn update_framing_clamps_zoom_to_image_limit() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector);

        let id = add_one(&mut ws, tmp.path(), "a.jpg");
        ws.update_framing(
            id,
            Framing {
                zoom: 99.0,
                ..Framing::fit(1.0)
            },
        )
        .unwrap();
        assert_eq!(ws.collection().get(id).unwrap().framing.zoom, 10.0);
    }

    #[test]
    fn clear_resets_collection_and_queue() {
        let tmp = TempDir::new().unwrap();
        let detector = Arc::new(MockDetector::default());
        let mut ws = workspace_with_detector(tmp.path(), detector);

        add_one(&mut ws, tmp.path(), "a.jpg");
        ws.clear();
        assert!(ws.collection().is_empty());
        assert_eq!(ws.queued_analysis(), 0);
    }
}
