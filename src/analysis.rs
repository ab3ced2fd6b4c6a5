//! Saliency cache and concurrency-bounded batch analysis.
//!
//! Detection is the expensive step of the pipeline, so results are memoized
//! by a structured composite key — image identity plus target dimensions —
//! and the batch runner caps how many detector invocations are in flight at
//! once (default [`DEFAULT_CONCURRENCY`]).
//!
//! # Cache keys
//!
//! A suggestion is only valid for the target dimensions it was computed for,
//! so the key is `(ImageId, target_width, target_height)`. Entries are
//! invalidated explicitly: per image on removal, or wholesale when the
//! global target dimensions change (see [`crate::workspace`]). There is no
//! key-prefix scanning — invalidation walks the map with a plain retain.
//!
//! # Failure semantics
//!
//! A detector invocation that fails is logged and resolved as "no
//! suggestion" for that image; the caller falls back to the default fit
//! framing. Smart crop is an enhancement, never a requirement — one bad
//! image never aborts a batch.

use crate::collection::ImageId;
use crate::detect::SaliencyDetector;
use crate::geometry::SalientRegion;
use image::DynamicImage;
use log::warn;
use std::collections::HashMap;
use std::fmt;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

/// Default ceiling on concurrent detector invocations. The detector is
/// assumed CPU-heavy; two slots keep a dual-core machine busy without
/// starving the rest of the process.
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Composite cache key: a suggestion is scoped to one image at one set of
/// target dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CacheKey {
    id: ImageId,
    target_width: u32,
    target_height: u32,
}

/// One scheduled detection. Carries an immutable snapshot of everything the
/// worker needs — never a reference into the collection, so a concurrent
/// removal cannot invalidate it.
#[derive(Clone)]
pub struct AnalysisJob {
    pub id: ImageId,
    pub pixels: Arc<DynamicImage>,
    pub target_width: u32,
    pub target_height: u32,
}

/// Completion record for one job. `region` is `None` when detection failed.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub id: ImageId,
    pub target_width: u32,
    pub target_height: u32,
    pub region: Option<SalientRegion>,
}

/// Cache hit/miss counters for a session, printable as a one-line summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisStats {
    pub hits: u32,
    pub detections: u32,
    pub failures: u32,
}

impl AnalysisStats {
    pub fn total(&self) -> u32 {
        self.hits + self.detections + self.failures
    }
}

impl fmt::Display for AnalysisStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures > 0 {
            write!(
                f,
                "{} cached, {} detected, {} failed ({} total)",
                self.hits,
                self.detections,
                self.failures,
                self.total()
            )
        } else if self.hits > 0 {
            write!(
                f,
                "{} cached, {} detected ({} total)",
                self.hits,
                self.detections,
                self.total()
            )
        } else {
            write!(f, "{} detected", self.detections)
        }
    }
}

/// Memoizing front end over a [`SaliencyDetector`] with a bounded batch mode.
pub struct Analyzer {
    detector: Arc<dyn SaliencyDetector>,
    cache: Mutex<HashMap<CacheKey, SalientRegion>>,
    stats: Mutex<AnalysisStats>,
    concurrency: usize,
}

impl Analyzer {
    pub fn new(detector: Arc<dyn SaliencyDetector>, concurrency: usize) -> Self {
        Self {
            detector,
            cache: Mutex::new(HashMap::new()),
            stats: Mutex::new(AnalysisStats::default()),
            concurrency: concurrency.max(1),
        }
    }

    /// Analyze a single image, memoized.
    ///
    /// Returns `None` when detection fails; failures are not cached, so a
    /// later retry re-invokes the detector.
    pub fn analyze(
        &self,
        pixels: &DynamicImage,
        id: ImageId,
        target_width: u32,
        target_height: u32,
    ) -> Option<SalientRegion> {
        let key = CacheKey {
            id,
            target_width,
            target_height,
        };
        if let Some(region) = self.cache.lock().unwrap().get(&key).copied() {
            self.stats.lock().unwrap().hits += 1;
            return Some(region);
        }

        match self.detector.detect(pixels, target_width, target_height) {
            Ok(region) => {
                self.cache.lock().unwrap().insert(key, region);
                self.stats.lock().unwrap().detections += 1;
                Some(region)
            }
            Err(e) => {
                warn!("saliency detection failed for image {id:?}: {e}");
                self.stats.lock().unwrap().failures += 1;
                None
            }
        }
    }

    /// Run a batch of jobs with the configured concurrency ceiling.
    ///
    /// `progress` fires exactly once per job, after it completes (success,
    /// failure, or cache hit), with `(completed, total)`. Jobs are admitted
    /// in submission order as slots free up; a failing job is isolated and
    /// reported with `region: None`. Outcomes are returned in completion
    /// order.
    pub fn run_batch<F>(&self, jobs: Vec<AnalysisJob>, mut progress: F) -> Vec<AnalysisOutcome>
    where
        F: FnMut(usize, usize),
    {
        let total = jobs.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut completed = 0usize;

        // Cache hits resolve immediately, without occupying a detector slot.
        let mut misses = Vec::new();
        for job in jobs {
            let key = CacheKey {
                id: job.id,
                target_width: job.target_width,
                target_height: job.target_height,
            };
            let cached = self.cache.lock().unwrap().get(&key).copied();
            match cached {
                Some(region) => {
                    self.stats.lock().unwrap().hits += 1;
                    completed += 1;
                    progress(completed, total);
                    outcomes.push(AnalysisOutcome {
                        id: job.id,
                        target_width: job.target_width,
                        target_height: job.target_height,
                        region: Some(region),
                    });
                }
                None => misses.push(job),
            }
        }

        if misses.is_empty() {
            return outcomes;
        }

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.concurrency)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                // Degrade to sequential analysis rather than failing the batch.
                warn!("analysis thread pool unavailable ({e}); running sequentially");
                for job in misses {
                    let region = self.analyze(&job.pixels, job.id, job.target_width, job.target_height);
                    completed += 1;
                    progress(completed, total);
                    outcomes.push(AnalysisOutcome {
                        id: job.id,
                        target_width: job.target_width,
                        target_height: job.target_height,
                        region,
                    });
                }
                return outcomes;
            }
        };

        let (tx, rx) = mpsc::channel();
        for job in misses {
            let tx = tx.clone();
            let detector = Arc::clone(&self.detector);
            pool.spawn(move || {
                let result = detector.detect(&job.pixels, job.target_width, job.target_height);
                // The receiver outlives every worker; a send failure means
                // the batch was abandoned and the result is moot.
                tx.send((job.id, job.target_width, job.target_height, result))
                    .ok();
            });
        }
        drop(tx);

        for (id, target_width, target_height, result) in rx {
            completed += 1;
            let region = match result {
                Ok(region) => {
                    let key = CacheKey {
                        id,
                        target_width,
                        target_height,
                    };
                    self.cache.lock().unwrap().insert(key, region);
                    self.stats.lock().unwrap().detections += 1;
                    Some(region)
                }
                Err(e) => {
                    warn!("saliency detection failed for image {id:?}: {e}");
                    self.stats.lock().unwrap().failures += 1;
                    None
                }
            };
            progress(completed, total);
            outcomes.push(AnalysisOutcome {
                id,
                target_width,
                target_height,
                region,
            });
        }

        outcomes
    }

    /// Drop every cached suggestion for one image (called on removal).
    pub fn invalidate_image(&self, id: ImageId) {
        self.cache.lock().unwrap().retain(|key, _| key.id != id);
    }

    /// Drop every cached suggestion (workspace reset, target-dimension change).
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    pub fn stats(&self) -> AnalysisStats {
        *self.stats.lock().unwrap()
    }
}
