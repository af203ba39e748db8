//! Worker error types.

use std::error::Error as _;

use rally_media::MediaError;
use rally_models::JobErrorKind;
use rally_queue::QueueError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not open video: {0}")]
    VideoOpen(#[source] MediaError),

    #[error("Video processing failed: {0}")]
    Processing(#[source] MediaError),

    #[error("Video conversion failed: {0}")]
    Conversion(#[source] MediaError),

    #[error("Course recommendation failed: {0}")]
    Recommendation(String),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Classify a frame pipeline failure.
    pub fn from_pipeline(err: MediaError) -> Self {
        match err {
            e if e.is_open_failure() => Self::VideoOpen(e),
            MediaError::Internal(msg) => Self::Internal(msg),
            e => Self::Processing(e),
        }
    }

    pub fn recommendation(msg: impl Into<String>) -> Self {
        Self::Recommendation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The failure class recorded on the job.
    pub fn kind(&self) -> JobErrorKind {
        match self {
            WorkerError::VideoOpen(_) => JobErrorKind::VideoOpen,
            WorkerError::Processing(_) => JobErrorKind::Processing,
            WorkerError::Conversion(_) => JobErrorKind::Conversion,
            WorkerError::Recommendation(_) => JobErrorKind::Recommendation,
            WorkerError::Timeout(_) => JobErrorKind::Timeout,
            WorkerError::Media(e) if e.is_open_failure() => JobErrorKind::VideoOpen,
            WorkerError::Media(MediaError::Timeout(_)) => JobErrorKind::Timeout,
            WorkerError::Media(_) => JobErrorKind::Processing,
            WorkerError::Internal(_) | WorkerError::Queue(_) | WorkerError::Io(_) => {
                JobErrorKind::Internal
            }
        }
    }

    /// Diagnostic text for the job record: the failure class followed by
    /// every error in the source chain.
    pub fn details(&self) -> String {
        let mut out = format!("kind: {}\nerror: {}", self.kind().as_str(), self);
        let mut source = self.source();
        while let Some(cause) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Errors returned to API callers.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to save upload file: {0}")]
    UploadPersist(String),

    #[error("Too many jobs waiting, try again later")]
    Busy,

    #[error("Job not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pipeline_classification() {
        let open = WorkerError::from_pipeline(MediaError::video_open(PathBuf::from("x"), "bad"));
        assert_eq!(open.kind(), JobErrorKind::VideoOpen);

        let internal = WorkerError::from_pipeline(MediaError::internal("panicked"));
        assert_eq!(internal.kind(), JobErrorKind::Internal);

        let other = WorkerError::from_pipeline(MediaError::frame_write("pipe closed"));
        assert_eq!(other.kind(), JobErrorKind::Processing);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(WorkerError::Timeout(5).kind(), JobErrorKind::Timeout);
        assert_eq!(
            WorkerError::Conversion(MediaError::FfmpegNotFound).kind(),
            JobErrorKind::Conversion
        );
        assert_eq!(
            WorkerError::recommendation("catalog").kind(),
            JobErrorKind::Recommendation
        );
        assert_eq!(
            WorkerError::Queue(QueueError::QueueClosed).kind(),
            JobErrorKind::Internal
        );
    }

    #[test]
    fn test_details_include_chain() {
        let err = WorkerError::Conversion(MediaError::FfmpegNotFound);
        let details = err.details();
        assert!(details.starts_with("kind: conversion"));
        assert!(details.contains("caused by: FFmpeg not found in PATH"));
    }
}
