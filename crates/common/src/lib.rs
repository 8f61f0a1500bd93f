//! Shared types for the Video Synchronizer workspace.
//!
//! Everything that crosses a crate boundary lives here: the decoded
//! [`RgbFrame`], per-file [`VideoMetadata`], the [`FrameSource`] decode
//! capability, and the error taxonomy for opening and decoding.

pub mod error;
pub mod frame;
pub mod metadata;
pub mod source;

pub use error::{DecodeError, OpenError};
pub use frame::RgbFrame;
pub use metadata::VideoMetadata;
pub use source::{share, FrameSource, SharedSource};
