use framecache::{DecodedImage, FrameDecoder, FrameIndex, HandlerObserver, RequestedFrame};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Decoder that paints a moving gradient instead of decoding a file
pub struct SyntheticDecoder {
    width: u32,
    height: u32,
    decode_time: Duration,
    /// Every n-th frame fails to decode
    fail_every: Option<u32>,
    decoded: AtomicU64,
}

impl SyntheticDecoder {
    pub fn new(width: u32, height: u32, decode_time: Duration, fail_every: Option<u32>) -> Self {
        Self {
            width,
            height,
            decode_time,
            fail_every: fail_every.filter(|n| *n > 0),
            decoded: AtomicU64::new(0),
        }
    }

    /// Frames produced so far
    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }

    fn render(&self, index: FrameIndex) -> RgbaImage {
        let shift = index.wrapping_mul(4);
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let r = (x.wrapping_add(shift) % 256) as u8;
            let g = (y.wrapping_add(shift) % 256) as u8;
            let b = (index % 256) as u8;
            Rgba([r, g, b, 255])
        })
    }
}

impl FrameDecoder for SyntheticDecoder {
    fn request_frame(&self, index: FrameIndex, for_caching: bool, buffer: &mut RequestedFrame) {
        thread::sleep(self.decode_time);

        if self.fail_every.is_some_and(|n| index % n == n - 1) {
            log::debug!("Synthetic decode of frame {} failed", index);
            return;
        }

        log::trace!("Decoded frame {} (caching: {})", index, for_caching);
        self.decoded.fetch_add(1, Ordering::Relaxed);
        buffer.set(index, DecodedImage::new(self.render(index)));
    }
}

/// Observer that logs notifications and counts them
#[derive(Default)]
pub struct LoggingObserver {
    frame_limit_changes: AtomicU64,
    state_changes: AtomicU64,
}

impl LoggingObserver {
    pub fn state_changes(&self) -> u64 {
        self.state_changes.load(Ordering::Relaxed)
    }

    pub fn frame_limit_changes(&self) -> u64 {
        self.frame_limit_changes.load(Ordering::Relaxed)
    }
}

impl HandlerObserver for LoggingObserver {
    fn frame_limits_changed(&self) {
        self.frame_limit_changes.fetch_add(1, Ordering::Relaxed);
        log::debug!("Frame limits may have changed");
    }

    fn state_changed(&self, redraw: bool, recache: bool) {
        self.state_changes.fetch_add(1, Ordering::Relaxed);
        log::debug!("Handler changed (redraw: {}, recache: {})", redraw, recache);
    }
}
