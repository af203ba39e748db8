//! Provider traits for the per-frame vision models.
//!
//! The frame pipeline only talks to these traits, so model backends can be
//! swapped (or stubbed in tests) without touching the frame loop.

use image::RgbImage;
use rally_models::{Detection, LandmarkSet};

use crate::error::MediaResult;

/// Produces body landmarks for the most prominent person in a frame.
pub trait PoseEstimator: Send + Sync {
    /// Landmarks for one person, or `None` when nobody is found.
    fn estimate(&self, frame: &RgbImage) -> MediaResult<Option<LandmarkSet>>;

    /// Whether a model is actually loaded.
    fn is_ready(&self) -> bool;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Produces labelled boxes for objects in a frame.
pub trait ObjectDetector: Send + Sync {
    fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<Detection>>;

    /// Whether a model is actually loaded.
    fn is_ready(&self) -> bool;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Pose estimator used when no pose model is available. Never finds anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPoseEstimator;

impl PoseEstimator for DisabledPoseEstimator {
    fn estimate(&self, _frame: &RgbImage) -> MediaResult<Option<LandmarkSet>> {
        Ok(None)
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Object detector used when no detection model is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledObjectDetector;

impl ObjectDetector for DisabledObjectDetector {
    fn detect(&self, _frame: &RgbImage) -> MediaResult<Vec<Detection>> {
        Ok(Vec::new())
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
