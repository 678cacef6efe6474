use image::{Rgba, RgbaImage};
use std::sync::Arc;

/// Bytes per pixel of a cached frame (RGBA8)
pub const BYTES_PER_PIXEL: u64 = 4;

/// Immutable handle to a decoded frame.
///
/// Cloning is cheap: the pixel data is shared, so copying a frame from the
/// cache into the display slot never copies pixels.
#[derive(Clone, Debug)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// A zero-sized image, what a failed conversion produces
    pub fn empty() -> Self {
        Self::new(RgbaImage::new(0, 0))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// True when the image holds no pixels
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Pixel at (x, y), `None` when out of bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> u64 {
        self.width() as u64 * self.height() as u64 * BYTES_PER_PIXEL
    }

    /// Whether both handles point at the same pixel buffer
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl PartialEq for DecodedImage {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.pixels == *other.pixels
    }
}

impl From<RgbaImage> for DecodedImage {
    fn from(pixels: RgbaImage) -> Self {
        Self::new(pixels)
    }
}
