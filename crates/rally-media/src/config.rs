//! Frame pipeline configuration.

use serde::{Deserialize, Serialize};

/// Hand used as the racquet hand for wrist-to-ball gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DominantHand {
    #[default]
    Right,
    Left,
}

impl std::str::FromStr for DominantHand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "right" => Ok(Self::Right),
            "left" => Ok(Self::Left),
            other => Err(format!("unknown hand '{}'", other)),
        }
    }
}

/// Tunables for one frame pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Overlay weight when blending onto the source frame
    pub alpha: f32,
    /// Minimum frames between two accepted shots
    pub debounce_frames: u64,
    /// Maximum wrist-to-ball distance (px) for a shot to count
    pub wrist_distance_threshold: f64,
    /// Frame rate used when the container reports an unusable one
    pub default_fps: f64,
    /// Highest frame rate accepted from the container
    pub max_fps: f64,
    /// Detector labels treated as the ball (case-insensitive)
    pub ball_labels: Vec<String>,
    /// Maximum ball positions kept for the trail
    pub trail_capacity: usize,
    /// Frames after which a trail position expires
    pub trail_max_age: u32,
    pub dominant_hand: DominantHand,
    /// Minimum detector confidence
    pub detector_confidence: f32,
    /// Minimum landmark visibility for drawing and rules
    pub min_landmark_visibility: f32,
    /// Ground ellipse width relative to shoulder width
    pub major_axis_factor: f32,
    /// Ground ellipse height relative to shoulder width
    pub minor_axis_factor: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            alpha: 0.6,
            debounce_frames: 15,
            wrist_distance_threshold: 300.0,
            default_fps: 30.0,
            max_fps: 120.0,
            ball_labels: default_ball_labels(),
            trail_capacity: 32,
            trail_max_age: 30,
            dominant_hand: DominantHand::Right,
            detector_confidence: 0.3,
            min_landmark_visibility: 0.5,
            major_axis_factor: 0.8,
            minor_axis_factor: 0.25,
        }
    }
}

fn default_ball_labels() -> Vec<String> {
    vec!["sports ball".into(), "ball".into(), "pickleball".into()]
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            alpha: env_or("OVERLAY_ALPHA", defaults.alpha).clamp(0.0, 1.0),
            debounce_frames: env_or("SHOT_DEBOUNCE_FRAMES", defaults.debounce_frames),
            wrist_distance_threshold: env_or(
                "WRIST_DISTANCE_THRESHOLD",
                defaults.wrist_distance_threshold,
            ),
            default_fps: env_or("DEFAULT_FPS", defaults.default_fps),
            max_fps: env_or("MAX_FPS", defaults.max_fps),
            ball_labels: std::env::var("BALL_LABELS")
                .map(|s| {
                    s.split(',')
                        .map(|l| l.trim().to_lowercase())
                        .filter(|l| !l.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.ball_labels),
            trail_capacity: env_or("BALL_TRAIL_CAPACITY", defaults.trail_capacity),
            trail_max_age: env_or("BALL_TRAIL_MAX_AGE", defaults.trail_max_age),
            dominant_hand: env_or("DOMINANT_HAND", defaults.dominant_hand),
            detector_confidence: env_or("DETECTOR_CONFIDENCE", defaults.detector_confidence),
            min_landmark_visibility: env_or(
                "MIN_LANDMARK_VISIBILITY",
                defaults.min_landmark_visibility,
            ),
            major_axis_factor: env_or("ELLIPSE_MAJOR_AXIS_FACTOR", defaults.major_axis_factor),
            minor_axis_factor: env_or("ELLIPSE_MINOR_AXIS_FACTOR", defaults.minor_axis_factor),
        }
    }
}
