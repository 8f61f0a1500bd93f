//! FFmpeg-backed [`FrameSource`](vs_common::FrameSource) implementation.

mod ffmpeg;

pub use ffmpeg::{init, FfmpegSource};
