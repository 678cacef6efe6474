//! Change notifications towards observers of a video handler
//!
//! Caching can finish dozens of frames per second while observers such as a
//! cached-frame counter only need a refresh once in a while. The
//! [`CachingTimer`] coalesces those completions: it is armed by every
//! caching event, does not re-arm while pending, and emits exactly one
//! `state_changed(false, false)` when it elapses.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Receives state changes from a video handler
pub trait HandlerObserver: Send + Sync {
    /// The number of frames in the sequence may have changed
    fn frame_limits_changed(&self) {}

    /// Something about the handler changed.
    ///
    /// `redraw` is set when the displayed content changed, `recache` when
    /// cached frames are no longer valid.
    fn state_changed(&self, redraw: bool, recache: bool);
}

/// Observer that ignores every notification
pub struct NoopObserver;

impl HandlerObserver for NoopObserver {
    fn state_changed(&self, _redraw: bool, _recache: bool) {}
}

/// One-shot delay timer that rate-limits caching notifications
pub struct CachingTimer {
    interval: Duration,
    pending: Arc<AtomicBool>,
    observer: Arc<dyn HandlerObserver>,
}

impl CachingTimer {
    pub fn new(interval: Duration, observer: Arc<dyn HandlerObserver>) -> Self {
        Self {
            interval,
            pending: Arc::new(AtomicBool::new(false)),
            observer,
        }
    }

    /// True while a notification is scheduled
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Arm the timer unless it is already pending
    pub fn start(&self) {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let pending = Arc::clone(&self.pending);
        let observer = Arc::clone(&self.observer);
        let interval = self.interval;

        let spawned = thread::Builder::new()
            .name("caching-timer".to_string())
            .spawn(move || {
                thread::sleep(interval);
                pending.store(false, Ordering::Release);
                observer.state_changed(false, false);
            });

        if let Err(e) = spawned {
            log::error!("Failed to start caching timer: {}", e);
            self.pending.store(false, Ordering::Release);
            self.observer.state_changed(false, false);
        }
    }
}
