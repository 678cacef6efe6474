//! Decoded video frame cache with current-frame staging
//!
//! This crate keeps decoded frames of a video sequence in memory so the
//! render path can display them with minimal latency. It consists of
//! several modules:
//!
//! - `frame_store`: frame index to decoded image map
//! - `in_flight`: per-frame decode registration so a frame is never decoded twice
//! - `current_frame`: the single frame staged for display
//! - `decoder`: the decode request boundary towards the external decoder
//! - `notify`: observer contract and the rate-limited caching notification
//! - `handler`: [`VideoHandler`], which coordinates everything
//! - `config`, `stats`: settings and fetch counters
//!
//! # Architecture
//!
//! 1. The render path asks for frame N; the staged frame answers at once
//! 2. Otherwise the cache is consulted and a hit is staged without decoding
//! 3. If a background worker is decoding N, the render path waits for it
//! 4. Only then is N requested from the decoder directly
//!
//! Background workers decode into the cache and notify observers at most
//! once per configured interval.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use framecache::{CacheSettings, DecodedImage, NoopObserver, VideoHandler};
//! use image::RgbaImage;
//!
//! let decoder = |_index: u32, _caching: bool| Some(DecodedImage::new(RgbaImage::new(16, 9)));
//! let handler = VideoHandler::new(
//!     Arc::new(decoder),
//!     Arc::new(NoopObserver),
//!     &CacheSettings::default(),
//! );
//! handler.set_frame_size(16, 9);
//!
//! handler.cache_frame(3);
//! assert!(handler.display_frame(3));
//! assert_eq!(handler.current_frame_index(), Some(3));
//! ```

pub mod config;
pub mod current_frame;
pub mod decoded;
pub mod decoder;
pub mod frame_store;
pub mod handler;
pub mod in_flight;
mod macros;
pub mod notify;
pub mod stats;
pub mod surface;

pub use common::{CacheSelection, CacheStats, FrameCacheError, FrameIndex};
pub use config::{CacheSettings, Config};
pub use decoded::DecodedImage;
pub use decoder::{FrameDecoder, RequestedFrame};
pub use handler::VideoHandler;
pub use notify::{HandlerObserver, NoopObserver};
pub use surface::{FrameRect, FrameSurface};
