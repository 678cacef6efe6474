//! Video handler tying the frame cache together
//!
//! The render path calls [`VideoHandler::display_frame`] (or
//! [`draw_frame`](VideoHandler::draw_frame)), background workers call
//! [`VideoHandler::cache_frame`]. Both may run at the same time for the
//! same frame without decoding it twice:
//!
//! 1. The display path checks the staged frame, then the cache.
//! 2. If another caller is decoding the frame, it waits for that decode and
//!    takes the result from the cache or the slot.
//! 3. Otherwise it registers its own decode and requests the frame from the
//!    decoder. The result is staged but not cached.
//!
//! The caching path registers its decode before starting it, inserts the
//! result into the cache and only then ends the registration. Since both
//! paths register, a frame has at most one decode running at any time.

use common::{CacheSelection, CacheStats, FrameCacheError, FrameIndex};
use image::Rgba;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::CacheSettings;
use crate::current_frame::CurrentFrame;
use crate::decoded::{BYTES_PER_PIXEL, DecodedImage};
use crate::decoder::{FrameDecoder, FrameRequester, RequestOutcome};
use crate::frame_store::FrameStore;
use crate::in_flight::{BeginDecode, InFlightRegistry};
use crate::lock;
use crate::notify::{CachingTimer, HandlerObserver};
use crate::stats::FetchStats;
use crate::surface::{FrameRect, FrameSurface};

/// Frame cache and display staging for one video sequence
pub struct VideoHandler {
    store: FrameStore,
    in_flight: InFlightRegistry,
    current: CurrentFrame,
    requester: FrameRequester,

    observer: Arc<dyn HandlerObserver>,
    caching_timer: CachingTimer,
    stats: FetchStats,

    /// Width and height of the sequence's frames
    frame_size: Mutex<(u32, u32)>,

    loading_in_background: AtomicBool,
    pixel_values_zoom: f64,
}

impl VideoHandler {
    pub fn new(
        decoder: Arc<dyn FrameDecoder>,
        observer: Arc<dyn HandlerObserver>,
        settings: &CacheSettings,
    ) -> Self {
        Self {
            store: FrameStore::new(),
            in_flight: InFlightRegistry::new(),
            current: CurrentFrame::new(),
            requester: FrameRequester::new(decoder),
            caching_timer: CachingTimer::new(settings.notify_interval(), Arc::clone(&observer)),
            observer,
            stats: FetchStats::new(),
            frame_size: Mutex::new((0, 0)),
            loading_in_background: AtomicBool::new(false),
            pixel_values_zoom: settings.pixel_values_zoom,
        }
    }

    pub fn frame_size(&self) -> (u32, u32) {
        *lock!(self.frame_size)
    }

    /// Set the sequence's frame size.
    ///
    /// A different size invalidates the staged frame and the whole cache.
    pub fn set_frame_size(&self, width: u32, height: u32) {
        {
            let mut size = lock!(self.frame_size);
            if *size == (width, height) {
                return;
            }
            log::info!(
                "Frame size changed from {}x{} to {}x{}",
                size.0,
                size.1,
                width,
                height
            );
            *size = (width, height);
        }
        self.video_format_changed();
    }

    /// Stage frame `index` for display.
    ///
    /// Returns true if the frame is staged afterwards. When it is not, the
    /// frame is still loading somewhere else (or failed to decode) and
    /// [`is_loading_in_background`](Self::is_loading_in_background) is set.
    pub fn display_frame(&self, index: FrameIndex) -> bool {
        let staged = self.fetch(index);
        self.loading_in_background.store(!staged, Ordering::Release);
        staged
    }

    /// Stage frame `index` and paint it centered onto `surface`.
    ///
    /// Pixel values are painted on top once `zoom` reaches the configured
    /// threshold.
    pub fn draw_frame(&self, surface: &mut dyn FrameSurface, index: FrameIndex, zoom: f64) {
        self.display_frame(index);

        let target = FrameRect::centered(self.frame_size(), zoom);
        if let Some(image) = self.current.image() {
            surface.draw_image(target, &image);
        }

        if zoom >= self.pixel_values_zoom {
            surface.draw_pixel_values(index, target, zoom);
        }
    }

    fn fetch(&self, index: FrameIndex) -> bool {
        if self.current.is_current(index) {
            self.stats.record_slot_hit();
            return true;
        }

        if self.make_cached_frame_current(index) {
            self.stats.record_cache_hit();
            return true;
        }

        let decode = match self.in_flight.try_begin_decode(index) {
            BeginDecode::Started(decode) => decode,
            BeginDecode::AlreadyInFlight(signal) => {
                signal.wait();
                self.stats.record_in_flight_wait();
                log::trace!("Waited for running decode of frame {}", index);
                // A caching decode leaves the frame in the cache, a display
                // decode leaves it in the slot
                return self.current.is_current(index) || self.make_cached_frame_current(index);
            }
        };

        // A caching decode may have finished between the lookup and the registration
        if self.make_cached_frame_current(index) {
            self.stats.record_cache_hit();
            return true;
        }

        let staged = self.load_frame(index);
        decode.finish();
        staged
    }

    /// Stage frame `index` from the cache without decoding
    pub fn make_cached_frame_current(&self, index: FrameIndex) -> bool {
        self.current.try_make_current(index, &self.store)
    }

    /// Decode frame `index` and stage it, bypassing the cache
    fn load_frame(&self, index: FrameIndex) -> bool {
        log::trace!("Loading frame {}", index);
        let generation = self.current.generation();

        let image = match self.requester.request(index, false) {
            RequestOutcome::Reused(image) => image,
            RequestOutcome::Decoded(image) => {
                self.stats.record_direct_decode();
                image
            }
            RequestOutcome::Failed => {
                self.stats.record_decode_failure();
                log::trace!(
                    "Loading frame {} failed, keeping frame {:?}",
                    index,
                    self.current.index()
                );
                return false;
            }
        };

        if !self.current.stage_if(generation, index, image) {
            log::debug!("Discarding frame {} decoded before invalidation", index);
            return false;
        }
        true
    }

    /// Decode frame `index` into the cache.
    ///
    /// Does nothing if the frame is cached already or another caller is
    /// decoding it right now. Returns true if this call added the frame.
    pub fn cache_frame(&self, index: FrameIndex) -> bool {
        let generation = self.current.generation();
        if self.store.contains(index) {
            log::trace!("Frame {} already in cache", index);
            return false;
        }

        let decode = match self.in_flight.try_begin_decode(index) {
            BeginDecode::Started(decode) => decode,
            BeginDecode::AlreadyInFlight(_) => {
                log::warn!(
                    "Frame {} is already being decoded. Are you caching the same frame twice?",
                    index
                );
                self.stats.record_duplicate_request();
                return false;
            }
        };

        // Another worker may have finished between the check and the registration
        if self.store.contains(index) {
            decode.finish();
            return false;
        }

        let added = match self.requester.request(index, true) {
            RequestOutcome::Reused(image) => self.insert_decoded(index, image, generation),
            RequestOutcome::Decoded(image) => {
                self.stats.record_cache_decode();
                self.insert_decoded(index, image, generation)
            }
            RequestOutcome::Failed => {
                self.stats.record_decode_failure();
                false
            }
        };

        // Waiters re-check the cache once this returns
        decode.finish();

        self.caching_timer.start();
        added
    }

    fn insert_decoded(&self, index: FrameIndex, image: DecodedImage, generation: u64) -> bool {
        if self.current.generation() != generation {
            log::debug!("Discarding frame {} decoded before invalidation", index);
            return false;
        }

        if !self.store.insert(index, image) {
            return false;
        }

        // Invalidated while inserting: the clear may have run first
        if self.current.generation() != generation {
            self.store.remove(index);
            return false;
        }

        log::debug!("Inserted frame {} into cache", index);
        true
    }

    pub fn is_cached(&self, index: FrameIndex) -> bool {
        self.store.contains(index)
    }

    pub fn cached_frame_count(&self) -> usize {
        self.store.len()
    }

    /// The cached image of frame `index`
    pub fn cached_image(&self, index: FrameIndex) -> Option<DecodedImage> {
        self.store.get(index)
    }

    pub fn cached_frames(&self) -> BTreeSet<FrameIndex> {
        self.store.keys()
    }

    /// Bytes one cached frame of the current size occupies
    pub fn caching_frame_size(&self) -> u64 {
        let (width, height) = self.frame_size();
        width as u64 * height as u64 * BYTES_PER_PIXEL
    }

    /// Bytes held by all cached frames
    pub fn cached_bytes(&self) -> u64 {
        self.store.byte_size()
    }

    /// Whether a decode of `index` is running
    pub fn is_caching(&self, index: FrameIndex) -> bool {
        self.in_flight.is_in_flight(index)
    }

    /// Remove one frame or all frames from the cache.
    ///
    /// Observers are told through the rate-limited caching notification.
    pub fn remove_from_cache(&self, selection: impl Into<CacheSelection>) {
        let selection = selection.into();
        let removed = self.store.remove_selection(selection);
        log::debug!("Removed {} frame(s) from cache ({:?})", removed, selection);

        self.caching_timer.start();
    }

    /// Drop every cached frame and notify observers immediately
    pub fn clear_cache(&self) {
        self.store.clear();
        log::debug!("Cache cleared");
        self.observer.state_changed(false, false);
    }

    /// Index of the staged frame, `None` if nothing is staged
    pub fn current_frame_index(&self) -> Option<FrameIndex> {
        self.current.index()
    }

    pub fn current_image(&self) -> Option<DecodedImage> {
        self.current.image()
    }

    /// True if the last requested frame could not be staged yet
    pub fn is_loading_in_background(&self) -> bool {
        self.loading_in_background.load(Ordering::Acquire)
    }

    /// Read a pixel of the staged frame
    pub fn pixel_value(&self, x: u32, y: u32) -> Result<Rgba<u8>, FrameCacheError> {
        let image = self.current.image().ok_or(FrameCacheError::NoFrameStaged)?;
        image.pixel(x, y).ok_or(FrameCacheError::PixelOutOfBounds {
            x,
            y,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Stage frame `index` on this handler and on `other` and return both
    /// images, for comparing the two sequences.
    ///
    /// Each handler decodes the frame at most once.
    pub fn prepare_difference(
        &self,
        other: &VideoHandler,
        index: FrameIndex,
    ) -> Option<(DecodedImage, DecodedImage)> {
        let mine = self.staged_image(index)?;
        let theirs = other.staged_image(index)?;
        Some((mine, theirs))
    }

    fn staged_image(&self, index: FrameIndex) -> Option<DecodedImage> {
        if !self.fetch(index) {
            return None;
        }
        self.current
            .staged()
            .and_then(|(staged, image)| (staged == index).then_some(image))
    }

    /// The sequence's format or geometry changed: everything decoded so far
    /// is invalid.
    pub fn video_format_changed(&self) {
        self.observer.frame_limits_changed();
        self.invalidate();
        self.observer.state_changed(true, true);
    }

    /// Drop the staged frame, the request buffer and the whole cache
    pub fn invalidate_all_buffers(&self) {
        self.observer.frame_limits_changed();
        self.invalidate();
        self.loading_in_background.store(false, Ordering::Release);
        self.observer.state_changed(true, true);
    }

    fn invalidate(&self) {
        self.current.invalidate();
        self.requester.invalidate();
        self.store.clear();
        log::info!("Video buffers invalidated");
    }

    pub fn fetch_stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Snapshot of the cache state and counters
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            cached_frames: self.store.len(),
            cached_bytes: self.store.byte_size(),
            in_flight: self.in_flight.len(),
            current_frame: self.current.index(),
            loading_in_background: self.is_loading_in_background(),
            ..Default::default()
        };
        self.stats.fill(&mut stats);
        stats
    }
}
