//! # Cropdeck
//!
//! Batch crop and re-encode images to a fixed aspect ratio, with smart-crop
//! suggestions. Load a set of photos, let a saliency detector propose a
//! framing for each one (or adjust them yourself through the library API),
//! and export the whole set as uniformly sized, sequentially numbered files.
//!
//! # Architecture: One Writer, Jobs by Value
//!
//! All editing state lives in a single in-memory [`collection::Collection`]
//! with exactly one writer, the [`workspace::Workspace`]. Everything
//! asynchronous — saliency detection, export rasterization — works on
//! immutable snapshots taken from the collection and reports back by image
//! identity:
//!
//! ```text
//! loader    files → decoded pixels + content fingerprint
//! workspace   add → framing (persisted match, detector suggestion, or fit)
//! analysis  jobs  → salient regions     (bounded concurrency, memoized)
//! export    crop  → resize → encode     (per-image failures isolated)
//! ```
//!
//! This shape exists for two reasons:
//!
//! - **No torn state**: every multi-field transition is one named call on
//!   the collection, and late results from removed images are discarded at
//!   commit time by identity lookup.
//! - **Testability**: detection hides behind the [`detect::SaliencyDetector`]
//!   trait, so pipeline tests run against a mock with scripted results.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | The framing model: normalized center + zoom → pixel crop rectangle |
//! | [`detect`] | Saliency detection trait and the built-in gradient/variance detector |
//! | [`analysis`] | Memoizing, concurrency-bounded batch front end over a detector |
//! | [`collection`] | The authoritative image collection and its named transitions |
//! | [`workspace`] | Orchestration: loading, analysis scheduling, settings rules, persistence |
//! | [`loader`] | Decode, EXIF orientation normalization, fingerprinting, previews |
//! | [`settings`] | Global settings block: auto-detect, grid overlay, export parameters |
//! | [`persist`] | Best-effort JSON store for settings and per-fingerprint framings |
//! | [`export`] | Crop, resize, encode, write — the batch output stage |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Framings Are Resolution-Relative
//!
//! A framing stores a normalized center and a zoom factor, never pixel
//! coordinates. Changing the target dimensions therefore re-targets every
//! framing by swapping one field (the aspect); the actual crop rectangle is
//! computed lazily at render time by [`geometry::calculate_crop`]. See the
//! [`geometry`] module docs for the full model.
//!
//! ## Fingerprints, Not Paths
//!
//! Persisted framings are keyed by a SHA-256 of the file bytes. Rename or
//! move a file and it still recalls the framing you chose for it; edit the
//! pixels and it correctly does not.
//!
//! ## Detection Is an Enhancement
//!
//! The detector can be slow, wrong, or broken — none of that may hurt the
//! batch. Failures degrade to the centered fit crop, are never cached, and
//! never abort anything. The concurrency ceiling
//! ([`analysis::DEFAULT_CONCURRENCY`]) keeps a large add from saturating
//! the machine.
//!
//! ## Best-Effort Persistence
//!
//! The store ([`persist::Store`]) may be missing, corrupt, or unwritable;
//! every load degrades to defaults and every save logs and moves on. A
//! broken store is indistinguishable from a cold start, by contract.

pub mod analysis;
pub mod collection;
pub mod detect;
pub mod export;
pub mod geometry;
pub mod loader;
pub mod output;
pub mod persist;
pub mod settings;
pub mod workspace;
