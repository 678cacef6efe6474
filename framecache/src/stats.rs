//! Frame fetch statistics tracking
//!
//! This module counts how frame requests were answered:
//! - From the staged frame or the cache (no decode)
//! - By waiting on someone else's decode
//! - By decoding (display path and caching path separately)
//! - Failures and misuse (duplicate caching requests)

use common::CacheStats;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::lock;

/// Tracks how frame requests were served
pub struct FetchStats {
    slot_hits: AtomicU64,
    cache_hits: AtomicU64,
    in_flight_waits: AtomicU64,
    direct_decodes: AtomicU64,
    cache_decodes: AtomicU64,
    decode_failures: AtomicU64,
    duplicate_requests: AtomicU64,

    /// Last time stats were logged
    last_stats_log: Mutex<Instant>,
}

impl FetchStats {
    /// Create new statistics tracker
    pub fn new() -> Self {
        Self {
            slot_hits: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            in_flight_waits: AtomicU64::new(0),
            direct_decodes: AtomicU64::new(0),
            cache_decodes: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            duplicate_requests: AtomicU64::new(0),
            last_stats_log: Mutex::new(Instant::now()),
        }
    }

    pub fn record_slot_hit(&self) {
        self.slot_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_in_flight_wait(&self) {
        self.in_flight_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_direct_decode(&self) {
        self.direct_decodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_decode(&self) {
        self.cache_decodes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_request(&self) {
        self.duplicate_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate_requests(&self) -> u64 {
        self.duplicate_requests.load(Ordering::Relaxed)
    }

    /// Copy the counters into a stats snapshot
    pub fn fill(&self, stats: &mut CacheStats) {
        stats.slot_hits = self.slot_hits.load(Ordering::Relaxed);
        stats.cache_hits = self.cache_hits.load(Ordering::Relaxed);
        stats.in_flight_waits = self.in_flight_waits.load(Ordering::Relaxed);
        stats.direct_decodes = self.direct_decodes.load(Ordering::Relaxed);
        stats.cache_decodes = self.cache_decodes.load(Ordering::Relaxed);
        stats.decode_failures = self.decode_failures.load(Ordering::Relaxed);
    }

    /// Log statistics if interval has elapsed
    pub fn maybe_log_stats(&self, interval: Duration) {
        {
            let mut last = lock!(self.last_stats_log);
            if last.elapsed() < interval {
                return;
            }
            *last = Instant::now();
        }

        let mut stats = CacheStats::default();
        self.fill(&mut stats);

        log::info!(
            "Fetch stats: {} slot hits, {} cache hits, {} waits, {} direct decodes ({:.1}% hit rate)",
            stats.slot_hits,
            stats.cache_hits,
            stats.in_flight_waits,
            stats.direct_decodes,
            stats.hit_rate()
        );
        log::debug!(
            "Caching: {} decodes, {} failures, {} duplicate requests",
            stats.cache_decodes,
            stats.decode_failures,
            self.duplicate_requests()
        );
    }

    /// Reset statistics counters
    pub fn reset(&self) {
        for counter in [
            &self.slot_hits,
            &self.cache_hits,
            &self.in_flight_waits,
            &self.direct_decodes,
            &self.cache_decodes,
            &self.decode_failures,
            &self.duplicate_requests,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *lock!(self.last_stats_log) = Instant::now();
    }
}

impl Default for FetchStats {
    fn default() -> Self {
        Self::new()
    }
}
