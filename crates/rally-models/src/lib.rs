//! Shared data models for the Rally Vision backend.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs and their lifecycle
//! - Pose landmarks and object detections
//! - Shot events, feedback items and analysis results
//! - Course recommendations

pub mod analysis;
pub mod detection;
pub mod job;
pub mod pose;

// Re-export common types
pub use analysis::{
    AnalysisOutcome, AnalysisResult, Course, FeedbackCategory, FeedbackItem, ShotEvent,
};
pub use detection::{BallObservation, BoundingBox, Detection};
pub use job::{Job, JobErrorKind, JobId, JobStatus};
pub use pose::{Landmark, LandmarkSet, PoseLandmark};
