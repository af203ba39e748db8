#![deny(unreachable_patterns)]
//! Frame analysis for pickleball rally videos.
//!
//! This crate provides:
//! - FFmpeg probing, rawvideo frame I/O and browser re-encoding
//! - ONNX-backed pose estimation and object detection
//! - Ball tracking, shot detection and feedback aggregation
//! - Overlay rendering with imageproc and a bundled TrueType font
//! - The frame pipeline tying them together

pub mod ball_tracker;
pub mod command;
pub mod config;
pub mod context;
pub mod convert;
pub mod detection;
pub mod error;
pub mod feedback;
pub mod frames;
pub mod motion;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod rules;
pub mod shot_detector;

pub use ball_tracker::{BallSource, BallTracker};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use config::{DominantHand, PipelineConfig};
pub use context::{ModelContext, ModelHealth, ModelPaths};
pub use convert::{FfmpegConverter, VideoConverter};
pub use detection::{ObjectDetector, PoseEstimator};
pub use error::{MediaError, MediaResult};
pub use feedback::{merge_feedback, FeedbackAggregator};
pub use frames::{FfmpegFrameReader, FfmpegFrameWriter, FrameSink, FrameSource};
pub use overlay::{OverlayFont, OverlayRenderer};
pub use pipeline::{analyze_file, FramePipeline};
pub use probe::{probe_video, sanitize_fps, VideoInfo};
pub use rules::{BasicStrokeRules, TechniqueRules};
pub use shot_detector::ShotDetector;
