use common::FrameIndex;

use crate::decoded::DecodedImage;

/// Axis-aligned target rectangle in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRect {
    pub x: i64,
    pub y: i64,
    pub width: u64,
    pub height: u64,
}

impl FrameRect {
    /// Rectangle of `frame_size` scaled by `zoom`, centered on the origin
    pub fn centered(frame_size: (u32, u32), zoom: f64) -> Self {
        let width = (frame_size.0 as f64 * zoom).round().max(0.0) as u64;
        let height = (frame_size.1 as f64 * zoom).round().max(0.0) as u64;
        Self {
            x: -((width / 2) as i64),
            y: -((height / 2) as i64),
            width,
            height,
        }
    }
}

/// Painting target for staged frames
pub trait FrameSurface {
    /// Draw `image` stretched into `target`
    fn draw_image(&mut self, target: FrameRect, image: &DecodedImage);

    /// Draw per-pixel values on top of a strongly zoomed frame
    fn draw_pixel_values(&mut self, _frame: FrameIndex, _target: FrameRect, _zoom: f64) {}
}
