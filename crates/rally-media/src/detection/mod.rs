//! Vision model providers.
//!
//! - [`providers`]: traits the frame pipeline depends on, plus no-op fallbacks
//! - [`yolo`]: YOLOv8 object detector
//! - [`pose`]: YOLOv8-pose landmark estimator

mod onnx;
pub mod pose;
pub mod providers;
pub mod yolo;

pub use pose::{YoloPoseConfig, YoloPoseEstimator};
pub use providers::{DisabledObjectDetector, DisabledPoseEstimator, ObjectDetector, PoseEstimator};
pub use yolo::{YoloDetectorConfig, YoloObjectDetector, COCO_CLASSES};
