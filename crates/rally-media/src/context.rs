//! Model handles shared by every pipeline run.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::detection::{
    DisabledObjectDetector, DisabledPoseEstimator, ObjectDetector, PoseEstimator,
    YoloDetectorConfig, YoloObjectDetector, YoloPoseConfig, YoloPoseEstimator,
};
use crate::overlay::OverlayFont;
use crate::rules::{BasicStrokeRules, TechniqueRules};

/// Where model weights are loaded from.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub pose: PathBuf,
    pub detector: PathBuf,
    /// Overlay font; the bundled font is used when unset
    pub font: Option<PathBuf>,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            pose: YoloPoseConfig::default().model_path,
            detector: YoloDetectorConfig::default().model_path,
            font: None,
        }
    }
}

impl ModelPaths {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pose: std::env::var("POSE_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.pose),
            detector: std::env::var("DETECTOR_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.detector),
            font: std::env::var("FONT_PATH").ok().map(PathBuf::from),
        }
    }
}

/// Liveness of each handle, as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelHealth {
    pub pose: bool,
    pub model: bool,
    pub font: bool,
}

/// The set of model handles built once at startup and shared by all jobs.
#[derive(Clone)]
pub struct ModelContext {
    pub pose: Arc<dyn PoseEstimator>,
    pub detector: Arc<dyn ObjectDetector>,
    pub rules: Arc<dyn TechniqueRules>,
    pub font: Arc<OverlayFont>,
}

impl ModelContext {
    pub fn new(
        pose: Arc<dyn PoseEstimator>,
        detector: Arc<dyn ObjectDetector>,
        rules: Arc<dyn TechniqueRules>,
        font: Arc<OverlayFont>,
    ) -> Self {
        Self {
            pose,
            detector,
            rules,
            font,
        }
    }

    /// Context with no models loaded. Ball tracking falls back to motion.
    pub fn disabled(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(DisabledPoseEstimator),
            Arc::new(DisabledObjectDetector),
            Arc::new(BasicStrokeRules::new(
                config.dominant_hand,
                config.min_landmark_visibility,
            )),
            Arc::new(OverlayFont::bundled()),
        )
    }

    /// Load whichever models are present. A model that fails to load is
    /// replaced by its disabled provider and reported unhealthy.
    pub fn load(paths: &ModelPaths, config: &PipelineConfig) -> Self {
        let mut ctx = Self::disabled(config);

        match YoloPoseEstimator::new(YoloPoseConfig {
            model_path: paths.pose.clone(),
            ..YoloPoseConfig::default()
        }) {
            Ok(pose) => ctx.pose = Arc::new(pose),
            Err(e) => warn!(path = %paths.pose.display(), "Pose model unavailable: {}", e),
        }

        match YoloObjectDetector::new(YoloDetectorConfig {
            model_path: paths.detector.clone(),
            confidence_threshold: config.detector_confidence,
            ..YoloDetectorConfig::default()
        }) {
            Ok(detector) => ctx.detector = Arc::new(detector),
            Err(e) => warn!(path = %paths.detector.display(), "Detector model unavailable: {}", e),
        }

        if let Some(path) = &paths.font {
            ctx.font = Arc::new(OverlayFont::load(Some(path)));
        }

        let health = ctx.health();
        info!(
            pose = ctx.pose.name(),
            detector = ctx.detector.name(),
            rules = ctx.rules.name(),
            pose_ready = health.pose,
            detector_ready = health.model,
            "Model context ready"
        );
        ctx
    }

    pub fn health(&self) -> ModelHealth {
        ModelHealth {
            pose: self.pose.is_ready(),
            model: self.detector.is_ready(),
            // Falls back to the bundled font, so always available.
            font: true,
        }
    }
}
