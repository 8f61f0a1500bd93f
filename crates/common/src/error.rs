//! Error taxonomy for opening video files and decoding frames.

use std::path::PathBuf;

/// Failure to open a video file. Fatal to the one panel being created.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("no video stream in {}", .0.display())]
    NoVideoStream(PathBuf),

    #[error("{} contains no frames", .0.display())]
    Empty(PathBuf),

    #[error("cannot open {}: {reason}", path.display())]
    Backend { path: PathBuf, reason: String },
}

impl OpenError {
    /// Path of the file that failed to open.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(path) | Self::NoVideoStream(path) | Self::Empty(path) => path,
            Self::Backend { path, .. } => path,
        }
    }
}

/// Failure to decode a single frame. Never alters panel state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("frame {index} out of range (video has {frame_count} frames)")]
    OutOfRange { index: u32, frame_count: u32 },

    #[error("video source is closed")]
    Closed,

    #[error("frame {index} not found before end of stream")]
    EndOfStream { index: u32 },

    #[error("decoding frame {index} failed: {reason}")]
    Backend { index: u32, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_reports_path() {
        let err = OpenError::Backend {
            path: PathBuf::from("/videos/corrupt.mp4"),
            reason: "Invalid data found when processing input".into(),
        };
        assert_eq!(err.path(), std::path::Path::new("/videos/corrupt.mp4"));
        assert!(err.to_string().contains("corrupt.mp4"));
    }

    #[test]
    fn decode_error_messages() {
        let err = DecodeError::OutOfRange {
            index: 12,
            frame_count: 10,
        };
        assert_eq!(
            err.to_string(),
            "frame 12 out of range (video has 10 frames)"
        );
        assert_eq!(DecodeError::Closed.to_string(), "video source is closed");
    }
}
