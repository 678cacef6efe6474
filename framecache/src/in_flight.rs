//! Registry of decodes currently executing
//!
//! Each in-flight frame owns a one-shot [`DecodeSignal`]. The decoding party
//! completes the signal only after the decoded image is in the frame store
//! (or staged for display), so anyone who waits on it and then re-checks
//! sees the result.
//! The signal is registered before the decode starts, which leaves no window
//! where a second caller could miss it and decode the same frame again.

use common::FrameIndex;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use crate::lock;

/// One-shot completion signal for a single frame decode
pub struct DecodeSignal {
    index: FrameIndex,
    done: Mutex<bool>,
    condvar: Condvar,
}

impl DecodeSignal {
    fn new(index: FrameIndex) -> Self {
        Self {
            index,
            done: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn index(&self) -> FrameIndex {
        self.index
    }

    pub fn is_complete(&self) -> bool {
        *lock!(self.done)
    }

    /// Block until the decode has finished. Returns at once if it already has.
    pub fn wait(&self) {
        let mut done = lock!(self.done);
        while !*done {
            done = self
                .condvar
                .wait(done)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    fn complete(&self) {
        {
            let mut done = lock!(self.done);
            *done = true;
        }
        self.condvar.notify_all();
    }
}

/// Outcome of [`InFlightRegistry::try_begin_decode`]
pub enum BeginDecode<'a> {
    /// The caller owns the decode and must run it
    Started(InFlightDecode<'a>),
    /// Someone else is already decoding this frame
    AlreadyInFlight(Arc<DecodeSignal>),
}

/// Ownership of a registered decode.
///
/// Dropping it (or calling [`finish`](Self::finish)) completes the signal
/// and removes the registry entry, so the entry can never go stale even if
/// the decoder panics.
pub struct InFlightDecode<'a> {
    registry: &'a InFlightRegistry,
    signal: Arc<DecodeSignal>,
}

impl InFlightDecode<'_> {
    pub fn index(&self) -> FrameIndex {
        self.signal.index
    }

    pub fn signal(&self) -> &Arc<DecodeSignal> {
        &self.signal
    }

    /// End the decode, waking every waiter
    pub fn finish(self) {}
}

impl Drop for InFlightDecode<'_> {
    fn drop(&mut self) {
        self.registry.end_decode(self.signal.index, &self.signal);
    }
}

/// Frame index to in-flight decode mapping
#[derive(Default)]
pub struct InFlightRegistry {
    decodes: Mutex<HashMap<FrameIndex, Arc<DecodeSignal>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a decode for `index` unless one is already running.
    ///
    /// An existing entry is returned untouched; no second signal is created.
    pub fn try_begin_decode(&self, index: FrameIndex) -> BeginDecode<'_> {
        let mut decodes = lock!(self.decodes);
        if let Some(existing) = decodes.get(&index) {
            return BeginDecode::AlreadyInFlight(Arc::clone(existing));
        }

        let signal = Arc::new(DecodeSignal::new(index));
        decodes.insert(index, Arc::clone(&signal));
        log::trace!("Decode of frame {} registered as in flight", index);

        BeginDecode::Started(InFlightDecode {
            registry: self,
            signal,
        })
    }

    /// Complete `signal` and drop its registry entry.
    ///
    /// The signal is completed first, then the entry is removed. The entry
    /// is only removed if it still belongs to `signal`.
    pub fn end_decode(&self, index: FrameIndex, signal: &Arc<DecodeSignal>) {
        signal.complete();

        let mut decodes = lock!(self.decodes);
        if decodes
            .get(&index)
            .is_some_and(|current| Arc::ptr_eq(current, signal))
        {
            decodes.remove(&index);
            log::trace!("Decode of frame {} finished", index);
        }
    }

    pub fn is_in_flight(&self, index: FrameIndex) -> bool {
        lock!(self.decodes).contains_key(&index)
    }

    pub fn len(&self) -> usize {
        lock!(self.decodes).len()
    }

    pub fn is_empty(&self) -> bool {
        lock!(self.decodes).is_empty()
    }
}
