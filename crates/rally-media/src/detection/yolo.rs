//! Object detection using a YOLOv8 ONNX model.

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::ArrayView2;
use rally_models::{BoundingBox, Detection};
use tracing::{debug, info};

use super::onnx::{non_maximum_suppression, OnnxModel};
use super::providers::ObjectDetector;
use crate::error::{MediaError, MediaResult};

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct YoloDetectorConfig {
    /// Path to ONNX model file
    pub model_path: PathBuf,
    /// Confidence threshold for detections
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n.onnx"),
            confidence_threshold: 0.3,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// YOLOv8 detector producing pixel-space boxes with COCO labels.
pub struct YoloObjectDetector {
    model: OnnxModel,
    config: YoloDetectorConfig,
}

impl YoloObjectDetector {
    /// Load the detector. Fails if the model file is missing or invalid.
    pub fn new(config: YoloDetectorConfig) -> MediaResult<Self> {
        let model = OnnxModel::load(Path::new(&config.model_path), config.input_size)?;
        info!(
            model_path = %config.model_path.display(),
            confidence = config.confidence_threshold,
            "Object detector initialized"
        );
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &YoloDetectorConfig {
        &self.config
    }
}

impl ObjectDetector for YoloObjectDetector {
    fn detect(&self, frame: &RgbImage) -> MediaResult<Vec<Detection>> {
        let output = self.model.infer(frame)?;
        let detections = decode_detections(
            &output,
            frame.width(),
            frame.height(),
            self.model.input_size(),
            self.config.confidence_threshold,
            self.config.nms_threshold,
        )?;
        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "yolov8"
    }
}

/// Decode a YOLOv8 `[1, 84, N]` output into pixel-space detections.
///
/// Each column is `cx, cy, w, h` in model input coordinates followed by
/// 80 class scores.
pub fn decode_detections(
    output: &[f32],
    frame_width: u32,
    frame_height: u32,
    input_size: u32,
    confidence_threshold: f32,
    nms_threshold: f32,
) -> MediaResult<Vec<Detection>> {
    let num_features = 4 + COCO_CLASSES.len();
    if output.is_empty() || output.len() % num_features != 0 {
        return Err(MediaError::detection_failed(format!(
            "Unexpected output size {} for {} features",
            output.len(),
            num_features
        )));
    }
    let num_boxes = output.len() / num_features;

    let features = ArrayView2::from_shape((num_features, num_boxes), output)
        .map_err(|e| MediaError::internal(format!("Failed to reshape output: {}", e)))?;
    let rows = features.t();

    let scale_w = frame_width as f32 / input_size as f32;
    let scale_h = frame_height as f32 / input_size as f32;
    let max_x = frame_width as f32;
    let max_y = frame_height as f32;

    let mut candidates = Vec::new();
    for row in rows.outer_iter() {
        let (class_id, score) = row
            .iter()
            .skip(4)
            .enumerate()
            .fold((0usize, 0f32), |best, (c, &s)| if s > best.1 { (c, s) } else { best });

        if score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, max_x);
        let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, max_y);
        let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, max_x);
        let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, max_y);

        candidates.push((score, [x1, y1, x2, y2], class_id));
    }

    // Suppress per class so a ball inside a person box survives.
    let mut by_class: Vec<Vec<(f32, [f32; 4], usize)>> = vec![Vec::new(); COCO_CLASSES.len()];
    for c in candidates {
        by_class[c.2].push(c);
    }

    let mut detections: Vec<Detection> = by_class
        .into_iter()
        .filter(|c| !c.is_empty())
        .flat_map(|c| non_maximum_suppression(c, nms_threshold))
        .map(|(score, b, class_id)| {
            Detection::new(
                BoundingBox::from_corners(b[0] as f64, b[1] as f64, b[2] as f64, b[3] as f64),
                COCO_CLASSES[class_id],
                score,
            )
        })
        .collect();

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(detections)
}
