//! Common types and utilities for framecache.
//!
//! This crate defines the plain data shared between the cache library
//! (`framecache`) and the control tool (`fcachectl`): frame indices, cache
//! selections, the serializable statistics snapshot and the error type.
//!
//! # Examples
//!
//! ```
//! use common::{CacheSelection, CacheStats};
//!
//! // Drop a single frame from the cache
//! let selection = CacheSelection::Frame(42);
//! assert!(selection.matches(42));
//!
//! // Stats snapshots travel as JSON
//! let stats = CacheStats::default();
//! let json = serde_json::to_string(&stats).unwrap();
//! assert!(json.contains("cached_frames"));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a frame in a sequence.
///
/// "No frame" is expressed as `Option<FrameIndex>::None` rather than a
/// negative sentinel.
pub type FrameIndex = u32;

/// Common error types shared between the library and the control tool.
///
/// All errors are serializable so they can be reported in JSON output.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameCacheError {
    #[error("No frame is staged for display")]
    NoFrameStaged,

    #[error("Pixel ({x}, {y}) is outside the staged {width}x{height} frame")]
    PixelOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Which cached frames an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSelection {
    /// A single frame
    Frame(FrameIndex),
    /// Every cached frame
    All,
}

impl CacheSelection {
    /// Whether the selection covers `index`
    pub fn matches(&self, index: FrameIndex) -> bool {
        match self {
            Self::Frame(selected) => *selected == index,
            Self::All => true,
        }
    }
}

impl From<Option<FrameIndex>> for CacheSelection {
    /// `None` selects everything, mirroring the "-1 means all" convention.
    fn from(index: Option<FrameIndex>) -> Self {
        index.map_or(Self::All, Self::Frame)
    }
}

/// Point-in-time snapshot of a frame cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of frames held in the cache
    pub cached_frames: usize,

    /// Approximate memory held by cached frames, in bytes
    pub cached_bytes: u64,

    /// Decodes currently executing on behalf of the cache
    pub in_flight: usize,

    /// Frame currently staged for display, if any
    pub current_frame: Option<FrameIndex>,

    /// True when the last requested frame is still being loaded elsewhere
    pub loading_in_background: bool,

    /// Requests answered by the staged frame without touching the cache
    pub slot_hits: u64,

    /// Requests answered from the cache
    pub cache_hits: u64,

    /// Requests that waited on another party's decode
    pub in_flight_waits: u64,

    /// Decodes issued by the display path
    pub direct_decodes: u64,

    /// Decodes issued by the caching path
    pub cache_decodes: u64,

    /// Decode requests that failed or were redirected
    pub decode_failures: u64,
}

impl CacheStats {
    /// Fraction of display requests served without a decode, as a percentage
    pub fn hit_rate(&self) -> f64 {
        let hits = self.slot_hits + self.cache_hits + self.in_flight_waits;
        let total = hits + self.direct_decodes;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}
