//! Body pose estimation using a YOLOv8-pose ONNX model.

use std::path::PathBuf;

use image::RgbImage;
use rally_models::{Landmark, LandmarkSet, PoseLandmark};
use tracing::info;

use super::onnx::OnnxModel;
use super::providers::PoseEstimator;
use crate::error::{MediaError, MediaResult};

/// Values per candidate: box (4) + person score (1) + 17 keypoints x (x, y, conf).
const POSE_FEATURES: usize = 5 + PoseLandmark::COUNT * 3;

#[derive(Debug, Clone)]
pub struct YoloPoseConfig {
    pub model_path: PathBuf,
    /// Minimum person score
    pub confidence_threshold: f32,
    pub input_size: u32,
}

impl Default for YoloPoseConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n-pose.onnx"),
            confidence_threshold: 0.5,
            input_size: 640,
        }
    }
}

/// Picks the highest-scoring person and reports its keypoints normalised to
/// the frame.
pub struct YoloPoseEstimator {
    model: OnnxModel,
    config: YoloPoseConfig,
}

impl YoloPoseEstimator {
    pub fn new(config: YoloPoseConfig) -> MediaResult<Self> {
        let model = OnnxModel::load(&config.model_path, config.input_size)?;
        info!(model_path = %config.model_path.display(), "Pose estimator initialized");
        Ok(Self { model, config })
    }
}

impl PoseEstimator for YoloPoseEstimator {
    fn estimate(&self, frame: &RgbImage) -> MediaResult<Option<LandmarkSet>> {
        let output = self.model.infer(frame)?;
        decode_pose(
            &output,
            self.model.input_size(),
            self.config.confidence_threshold,
        )
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "yolov8-pose"
    }
}

/// Decode a YOLOv8-pose `[1, 56, N]` output, keeping the best person only.
///
/// The model sees a stretched square input, so dividing keypoints by the
/// input edge yields frame-normalised coordinates directly.
pub fn decode_pose(
    output: &[f32],
    input_size: u32,
    confidence_threshold: f32,
) -> MediaResult<Option<LandmarkSet>> {
    if output.is_empty() || output.len() % POSE_FEATURES != 0 {
        return Err(MediaError::detection_failed(format!(
            "Unexpected pose output size {}",
            output.len()
        )));
    }
    let n = output.len() / POSE_FEATURES;
    let at = |feature: usize, i: usize| output[feature * n + i];

    let best = (0..n)
        .map(|i| (i, at(4, i)))
        .filter(|&(_, score)| score >= confidence_threshold)
        .max_by(|a, b| a.1.total_cmp(&b.1));

    let Some((i, _)) = best else {
        return Ok(None);
    };

    let size = input_size as f32;
    let landmarks = PoseLandmark::ALL
        .iter()
        .map(|&kind| {
            let base = 5 + kind.index() * 3;
            Landmark::new(
                kind,
                (at(base, i) / size).clamp(0.0, 1.0),
                (at(base + 1, i) / size).clamp(0.0, 1.0),
                at(base + 2, i),
            )
        })
        .collect();

    Ok(Some(LandmarkSet::new(landmarks)))
}
