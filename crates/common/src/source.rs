//! The decode capability a panel is built on.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{DecodeError, RgbFrame, VideoMetadata};

/// An opened video that can decode individual frames by index.
///
/// `decode_frame` blocks for as long as the seek and decode take and must
/// never be called from the interface thread.
pub trait FrameSource: Send {
    /// Metadata captured at open time.
    fn metadata(&self) -> &VideoMetadata;

    /// Seek to `index`, decode exactly one frame and convert it to RGB24.
    fn decode_frame(&mut self, index: u32) -> Result<RgbFrame, DecodeError>;

    /// Release the decode handle. Calling it more than once is a no-op.
    fn close(&mut self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

/// A source shared between its panel and the panel's background loader.
pub type SharedSource = Arc<Mutex<Box<dyn FrameSource>>>;

/// Wrap a source for sharing with a background loader.
pub fn share(source: Box<dyn FrameSource>) -> SharedSource {
    Arc::new(Mutex::new(source))
}
