//! Decode requests to the external frame decoder
//!
//! All decode requests go through one shared [`RequestedFrame`] buffer behind
//! a dedicated lock, so at most one request reaches the decoder at a time.
//! The buffer keeps the last result; a request for the frame it already holds
//! is answered from it without calling the decoder again.

use common::FrameIndex;
use std::sync::{Arc, Mutex};

use crate::decoded::DecodedImage;
use crate::lock;

/// Receiving end of a decode request.
///
/// The decoder writes the result index and image here. Leaving the index
/// different from the requested one signals that the decode failed or was
/// redirected.
#[derive(Default, Debug)]
pub struct RequestedFrame {
    index: Option<FrameIndex>,
    image: Option<DecodedImage>,
}

impl RequestedFrame {
    /// Store a decode result
    pub fn set(&mut self, index: FrameIndex, image: DecodedImage) {
        self.index = Some(index);
        self.image = Some(image);
    }

    pub fn index(&self) -> Option<FrameIndex> {
        self.index
    }

    pub fn image(&self) -> Option<&DecodedImage> {
        self.image.as_ref()
    }

    /// The buffered image, if it is the result for `index`
    pub fn result_for(&self, index: FrameIndex) -> Option<DecodedImage> {
        if self.index == Some(index) {
            self.image.clone()
        } else {
            None
        }
    }

    /// Forget the buffered result
    pub fn invalidate(&mut self) {
        self.index = None;
        self.image = None;
    }
}

/// Decodes frames on request.
///
/// Implementations block until the result is written. `for_caching` tells
/// the decoder the frame is being pre-loaded rather than displayed.
pub trait FrameDecoder: Send + Sync {
    fn request_frame(&self, index: FrameIndex, for_caching: bool, buffer: &mut RequestedFrame);
}

/// Closures returning an image (or `None` on failure) act as decoders
impl<F> FrameDecoder for F
where
    F: Fn(FrameIndex, bool) -> Option<DecodedImage> + Send + Sync,
{
    fn request_frame(&self, index: FrameIndex, for_caching: bool, buffer: &mut RequestedFrame) {
        if let Some(image) = self(index, for_caching) {
            buffer.set(index, image);
        }
    }
}

/// How a decode request was answered
#[derive(Debug)]
pub enum RequestOutcome {
    /// The buffer already held this frame
    Reused(DecodedImage),
    /// The decoder produced the frame
    Decoded(DecodedImage),
    /// The decoder failed or returned a different frame
    Failed,
}

impl RequestOutcome {
    pub fn image(self) -> Option<DecodedImage> {
        match self {
            Self::Reused(image) | Self::Decoded(image) => Some(image),
            Self::Failed => None,
        }
    }
}

/// Serialized access to the decoder through the shared request buffer
pub struct FrameRequester {
    decoder: Arc<dyn FrameDecoder>,
    buffer: Mutex<RequestedFrame>,
}

impl FrameRequester {
    pub fn new(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            decoder,
            buffer: Mutex::new(RequestedFrame::default()),
        }
    }

    /// Request frame `index`, blocking until the decoder has answered.
    ///
    /// The buffer lock is held for the whole decode.
    pub fn request(&self, index: FrameIndex, for_caching: bool) -> RequestOutcome {
        let mut buffer = lock!(self.buffer);
        if let Some(image) = buffer.result_for(index) {
            log::trace!("Frame {} already in the request buffer", index);
            return RequestOutcome::Reused(image);
        }

        log::trace!(
            "Requesting frame {} from decoder (caching: {})",
            index,
            for_caching
        );
        self.decoder.request_frame(index, for_caching, &mut buffer);

        match buffer.result_for(index) {
            Some(image) => RequestOutcome::Decoded(image),
            None => {
                log::debug!(
                    "Decoder answered request for frame {} with {:?}",
                    index,
                    buffer.index()
                );
                RequestOutcome::Failed
            }
        }
    }

    /// Index currently held by the request buffer
    pub fn buffered_index(&self) -> Option<FrameIndex> {
        lock!(self.buffer).index()
    }

    /// Reset the request buffer to "nothing requested"
    pub fn invalidate(&self) {
        lock!(self.buffer).invalidate();
    }
}
