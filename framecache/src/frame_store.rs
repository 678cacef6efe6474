//! In-memory store of decoded frames
//!
//! A single coarse lock guards the whole map. Decoding always happens
//! outside the lock; only the map operations themselves are serialized, so
//! lookups and enumeration stay fast while a decode runs elsewhere.

use common::{CacheSelection, FrameIndex};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use crate::decoded::DecodedImage;
use crate::lock;

/// Frame index to decoded image mapping
#[derive(Default)]
pub struct FrameStore {
    frames: Mutex<HashMap<FrameIndex, DecodedImage>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, index: FrameIndex) -> bool {
        lock!(self.frames).contains_key(&index)
    }

    /// Cheap clone of the cached image for `index`
    pub fn get(&self, index: FrameIndex) -> Option<DecodedImage> {
        lock!(self.frames).get(&index).cloned()
    }

    /// Insert a decoded frame.
    ///
    /// Empty images are rejected and an existing entry is never replaced.
    /// Returns true if the frame was added.
    pub fn insert(&self, index: FrameIndex, image: DecodedImage) -> bool {
        if image.is_empty() {
            log::debug!("Refusing to cache empty image for frame {}", index);
            return false;
        }

        let mut frames = lock!(self.frames);
        if frames.contains_key(&index) {
            return false;
        }
        frames.insert(index, image);
        true
    }

    pub fn len(&self) -> usize {
        lock!(self.frames).len()
    }

    pub fn is_empty(&self) -> bool {
        lock!(self.frames).is_empty()
    }

    /// Cached indices in ascending order
    pub fn keys(&self) -> BTreeSet<FrameIndex> {
        lock!(self.frames).keys().copied().collect()
    }

    /// Total pixel bytes held by the store
    pub fn byte_size(&self) -> u64 {
        lock!(self.frames).values().map(DecodedImage::byte_size).sum()
    }

    /// Remove one frame, returns true if it was cached
    pub fn remove(&self, index: FrameIndex) -> bool {
        lock!(self.frames).remove(&index).is_some()
    }

    /// Remove the selected frames, returns how many were dropped
    pub fn remove_selection(&self, selection: CacheSelection) -> usize {
        let mut frames = lock!(self.frames);
        let before = frames.len();
        frames.retain(|index, _| !selection.matches(*index));
        before - frames.len()
    }

    pub fn clear(&self) {
        lock!(self.frames).clear();
    }
}
