//! Current frame staging
//!
//! This module holds the single frame that is currently displayed:
//! - Staged index and image, kept apart from the frame cache
//! - Lock-free "is this frame already staged" check for the render path
//! - Promotion of a cached frame into the slot without decoding
//! - Generation counter bumped on invalidation, compared under the slot lock
//!   so a frame decoded before an invalidation is never staged after it

use common::FrameIndex;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::decoded::DecodedImage;
use crate::frame_store::FrameStore;
use crate::lock;

const NO_FRAME: i64 = -1;

#[derive(Default)]
struct Staged {
    index: Option<FrameIndex>,
    image: Option<DecodedImage>,
}

/// The frame currently staged for display
pub struct CurrentFrame {
    /// Mirror of `staged.index` for the lock-free check
    index: AtomicI64,

    /// Only bumped while `staged` is locked
    generation: AtomicU64,

    staged: Mutex<Staged>,
}

impl CurrentFrame {
    pub fn new() -> Self {
        Self {
            index: AtomicI64::new(NO_FRAME),
            generation: AtomicU64::new(0),
            staged: Mutex::new(Staged::default()),
        }
    }

    /// Index of the staged frame
    pub fn index(&self) -> Option<FrameIndex> {
        FrameIndex::try_from(self.index.load(Ordering::Acquire)).ok()
    }

    /// Check whether `index` is staged, without taking the slot lock
    pub fn is_current(&self, index: FrameIndex) -> bool {
        self.index.load(Ordering::Acquire) == i64::from(index)
    }

    /// Current generation; decodes remember it before they start
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Stage `image` as frame `index`
    pub fn stage(&self, index: FrameIndex, image: DecodedImage) {
        let mut staged = lock!(self.staged);
        self.store_staged(&mut staged, index, image);
    }

    /// Stage `image` as frame `index` unless the slot was invalidated after
    /// `generation` was read. Returns true if the frame was staged.
    pub fn stage_if(&self, generation: u64, index: FrameIndex, image: DecodedImage) -> bool {
        let mut staged = lock!(self.staged);
        if self.generation.load(Ordering::Acquire) != generation {
            return false;
        }
        self.store_staged(&mut staged, index, image);
        true
    }

    fn store_staged(&self, staged: &mut Staged, index: FrameIndex, image: DecodedImage) {
        staged.image = Some(image);
        staged.index = Some(index);
        self.index.store(i64::from(index), Ordering::Release);
    }

    /// Stage the cached copy of `index`, if the store has one
    pub fn try_make_current(&self, index: FrameIndex, store: &FrameStore) -> bool {
        let generation = self.generation();
        match store.get(index) {
            Some(image) => self.stage_if(generation, index, image),
            None => false,
        }
    }

    /// Get the staged image
    pub fn image(&self) -> Option<DecodedImage> {
        lock!(self.staged).image.clone()
    }

    /// Get the staged index and image together
    pub fn staged(&self) -> Option<(FrameIndex, DecodedImage)> {
        let staged = lock!(self.staged);
        Some((staged.index?, staged.image.clone()?))
    }

    /// Drop the staged frame and start a new generation
    pub fn invalidate(&self) {
        let mut staged = lock!(self.staged);
        self.generation.fetch_add(1, Ordering::AcqRel);
        staged.index = None;
        staged.image = None;
        self.index.store(NO_FRAME, Ordering::Release);
    }
}

impl Default for CurrentFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn image() -> DecodedImage {
        DecodedImage::new(RgbaImage::new(2, 2))
    }

    #[test]
    fn test_starts_empty() {
        let slot = CurrentFrame::new();
        assert_eq!(slot.index(), None);
        assert!(slot.image().is_none());
        assert!(slot.staged().is_none());
        assert!(!slot.is_current(0));
    }

    #[test]
    fn test_stage_and_invalidate() {
        let slot = CurrentFrame::new();
        let img = image();
        slot.stage(6, img.clone());

        assert_eq!(slot.index(), Some(6));
        assert!(slot.is_current(6));
        let (index, staged) = slot.staged().unwrap();
        assert_eq!(index, 6);
        assert!(staged.ptr_eq(&img));

        slot.invalidate();
        assert_eq!(slot.index(), None);
        assert!(slot.image().is_none());
    }

    #[test]
    fn test_stage_after_invalidation_is_rejected() {
        let slot = CurrentFrame::new();
        let generation = slot.generation();
        slot.stage(1, image());

        slot.invalidate();
        assert_ne!(slot.generation(), generation);
        assert!(!slot.stage_if(generation, 2, image()));
        assert_eq!(slot.index(), None);
        assert!(slot.image().is_none());

        assert!(slot.stage_if(slot.generation(), 2, image()));
        assert_eq!(slot.index(), Some(2));
    }

    #[test]
    fn test_try_make_current() {
        let store = FrameStore::new();
        let slot = CurrentFrame::new();
        assert!(!slot.try_make_current(2, &store));
        assert_eq!(slot.index(), None);

        let img = image();
        store.insert(2, img.clone());
        assert!(slot.try_make_current(2, &store));
        assert_eq!(slot.index(), Some(2));
        assert!(slot.image().unwrap().ptr_eq(&img));
    }
}
