//! Metadata reported by an opened video source.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Immutable description of an opened video file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub path: PathBuf,
    pub frame_count: u32,
    /// Frames per second. `0.0` when the container does not report a rate.
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
}

impl VideoMetadata {
    /// Duration in seconds, derived from frame count and rate.
    pub fn duration_secs(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    /// Last path component, or the whole path when there is none.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Byte size of one decoded RGB24 frame.
    pub fn frame_bytes(&self) -> usize {
        crate::RgbFrame::expected_len(self.width, self.height)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
