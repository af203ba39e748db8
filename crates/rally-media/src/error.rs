//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Could not open video file {path}: {reason}")]
    VideoOpen { path: PathBuf, reason: String },

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Font load failed: {0}")]
    Font(String),

    #[error("Frame write failed: {0}")]
    FrameWrite(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create a video-open failure for `path`.
    pub fn video_open(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::VideoOpen {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a frame sink failure.
    pub fn frame_write(message: impl Into<String>) -> Self {
        Self::FrameWrite(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the input could not be opened as a video at all.
    pub fn is_open_failure(&self) -> bool {
        matches!(self, Self::VideoOpen { .. } | Self::InvalidVideo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_failures() {
        assert!(MediaError::video_open("/tmp/x.mp4", "no stream").is_open_failure());
        assert!(MediaError::InvalidVideo("empty".into()).is_open_failure());
        assert!(!MediaError::ffmpeg_failed("decode", None, Some(1)).is_open_failure());
        assert!(!MediaError::Timeout(5).is_open_failure());
    }
}
