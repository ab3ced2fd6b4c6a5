//! The authoritative in-memory collection of loaded images.
//!
//! [`Collection`] is the single writer for every per-image editing state:
//! framing, saliency result, pending/processing flags, selection. All
//! mutation goes through named operations — there are no public fields to
//! poke — so every multi-field transition is atomic by construction (one
//! `&mut self` call, no observable intermediate state).
//!
//! Asynchronous completions never hold references into the collection:
//! they identify their entry by [`ImageId`] and [`Collection::resolve_analysis`]
//! looks the entry up at commit time, quietly no-oping when it was removed
//! in the meantime.

use crate::geometry::{Framing, SalientRegion};
use image::DynamicImage;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CollectionError {
    #[error("no image with id {0:?} in the collection")]
    NoSuchImage(ImageId),
}

/// Opaque identity of a collection entry. Unique for the lifetime of the
/// collection; never reused after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId {
    #[cfg(test)]
    pub(crate) fn for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

/// A loaded image ready to enter the collection: decoded pixels, preview,
/// and the framing chosen for it (persisted match or default fit).
pub struct NewImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<DynamicImage>,
    pub preview: Arc<DynamicImage>,
    pub framing: Framing,
}

/// One entry in the collection.
///
/// `width`/`height` are the orientation-normalized source dimensions and
/// never change after load. The pixel handle is immutable and shared
/// read-only with analysis and export workers via `Arc`.
#[derive(Debug, PartialEq)]
pub struct ManagedImage {
    pub id: ImageId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<DynamicImage>,
    pub preview: Arc<DynamicImage>,
    pub framing: Framing,
    pub salient: Option<SalientRegion>,
    /// A long-running per-image operation (e.g. export) is in flight.
    pub processing: bool,
    /// A saliency job has been scheduled but not yet resolved.
    pub analysis_pending: bool,
}

/// Order-preserving, identity-unique store of [`ManagedImage`] entries plus
/// the selection pointers.
#[derive(Default)]
pub struct Collection {
    entries: Vec<ManagedImage>,
    next_id: u64,
    selected: Option<ImageId>,
    edited: Option<ImageId>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Read access
    // -------------------------------------------------------------------------

    pub fn entries(&self) -> &[ManagedImage] {
        &self.entries
    }

    pub fn get(&self, id: ImageId) -> Option<&ManagedImage> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn selected(&self) -> Option<ImageId> {
        self.selected
    }

    pub fn edited(&self) -> Option<ImageId> {
        self.edited
    }

    fn get_mut(&mut self, id: ImageId) -> Result<&mut ManagedImage, CollectionError> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(CollectionError::NoSuchImage(id))
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Append loaded images in the given order, assigning fresh identities.
    pub fn add_images(&mut self, images: Vec<NewImage>) -> Vec<ImageId> {
        let mut ids = Vec::with_capacity(images.len());
        for image in images {
            let id = ImageId(self.next_id);
            self.next_id += 1;
            ids.push(id);
            self.entries.push(ManagedImage {
                id,
                name: image.name,
                width: image.width,
                height: image.height,
                pixels: image.pixels,
                preview: image.preview,
                framing: image.framing,
                salient: None,
                processing: false,
                analysis_pending: false,
            });
        }
        ids
    }

    /// Remove an entry, returning it so the caller can release associated
    /// resources (cache entries, persisted state). Selection and edit
    /// pointers referencing the entry are cleared — a dangling pointer to a
    /// removed entry is never observable.
    pub fn remove_image(&mut self, id: ImageId) -> Result<ManagedImage, CollectionError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(CollectionError::NoSuchImage(id))?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        if self.edited == Some(id) {
            self.edited = None;
        }
        Ok(self.entries.remove(index))
    }

    /// Empty the collection and clear both pointers.
    pub fn clear_all(&mut self) {
        self.entries.clear();
        self.selected = None;
        self.edited = None;
    }

    /// Replace an entry's framing.
    pub fn update_framing(&mut self, id: ImageId, framing: Framing) -> Result<(), CollectionError> {
        self.get_mut(id)?.framing = framing;
        Ok(())
    }

    /// Re-target every framing to a new aspect. Center and zoom are
    /// resolution-relative, so nothing else changes — no rectangle is
    /// recomputed until render or export time.
    pub fn rescale_all_framings(&mut self, new_aspect: f64) {
        for entry in &mut self.entries {
            entry.framing = entry.framing.with_target_aspect(new_aspect);
        }
    }

    /// Apply one framing's center/zoom to every entry, with the aspect
    /// forced to the current global export aspect. Each entry keeps its own
    /// content fingerprint — the framing is copied, not the identity.
    pub fn copy_framing_to_all(&mut self, framing: &Framing, export_aspect: f64) {
        for entry in &mut self.entries {
            entry.framing = Framing {
                center_x: framing.center_x,
                center_y: framing.center_y,
                zoom: framing.zoom,
                target_aspect: export_aspect,
                fingerprint: entry.framing.fingerprint.clone(),
            };
        }
    }

    pub fn set_analysis_pending(
        &mut self,
        id: ImageId,
        pending: bool,
    ) -> Result<(), CollectionError> {
        self.get_mut(id)?.analysis_pending = pending;
        Ok(())
    }

    pub fn set_processing(&mut self, id: ImageId, processing: bool) -> Result<(), CollectionError> {
        self.get_mut(id)?.processing = processing;
        Ok(())
    }

    /// Commit the outcome of an analysis job in one observable transition:
    /// store the result and derived framing (when detection succeeded) and
    /// clear the pending flag.
    ///
    /// Returns `false` when the entry no longer exists — the late result of
    /// a job whose image was removed is discarded without error.
    pub fn resolve_analysis(
        &mut self,
        id: ImageId,
        region: Option<SalientRegion>,
        framing: Option<Framing>,
    ) -> bool {
        let Ok(entry) = self.get_mut(id) else {
            return false;
        };
        if let Some(region) = region {
            entry.salient = Some(region);
        }
        if let Some(framing) = framing {
            entry.framing = framing;
        }
        entry.analysis_pending = false;
        true
    }

    /// Point the selection at an existing entry, or clear it.
    pub fn select(&mut self, id: Option<ImageId>) -> Result<(), CollectionError> {
        if let Some(id) = id
            && !self.contains(id)
        {
            return Err(CollectionError::NoSuchImage(id));
        }
        self.selected = id;
        Ok(())
    }

    /// Point the edit cursor at an existing entry, or clear it.
    pub fn edit(&mut self, id: Option<ImageId>) -> Result<(), CollectionError> {
        if let Some(id) = id
            && !self.contains(id)
        {
            return Err(CollectionError::NoSuchImage(id));
        }
        self.edited = id;
        Ok(())
    }
}
