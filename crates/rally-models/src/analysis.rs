//! Analysis results: feedback, shot events and course recommendations.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether a feedback item praises or criticises technique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    #[default]
    Good,
    Bad,
}

/// A single technique observation.
///
/// Two items are the same observation when their `(title, description)`
/// pair matches; the category is not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FeedbackItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: FeedbackCategory,
}

impl FeedbackItem {
    pub fn good(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: FeedbackCategory::Good,
        }
    }

    pub fn bad(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: FeedbackCategory::Bad,
        }
    }

    /// Identity key used for deduplication.
    pub fn key(&self) -> (&str, &str) {
        (&self.title, &self.description)
    }
}

/// An accepted stroke at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShotEvent {
    /// Stroke label, e.g. "forehand"
    #[serde(rename = "type")]
    pub shot_type: String,
    /// Seconds from the start of the video, two decimals
    pub time: f64,
    /// Pixel distance between the dominant wrist and the ball
    pub wrist_distance: f64,
}

impl ShotEvent {
    pub fn new(shot_type: impl Into<String>, time: f64, wrist_distance: f64) -> Self {
        Self {
            shot_type: shot_type.into(),
            time: round_to_centis(time),
            wrist_distance,
        }
    }
}

/// Round a timestamp to two decimal places.
pub fn round_to_centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

/// Aggregate produced by one frame pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// Number of frames decoded
    pub frame_count: u64,
    pub good_points: Vec<FeedbackItem>,
    pub errors: Vec<FeedbackItem>,
    pub detected_shots: Vec<ShotEvent>,
    /// Last accepted shot, if any
    pub detected_shot: Option<ShotEvent>,
}

impl AnalysisResult {
    /// Assemble a result; `detected_shot` is derived from the shot list.
    pub fn new(
        frame_count: u64,
        good_points: Vec<FeedbackItem>,
        errors: Vec<FeedbackItem>,
        detected_shots: Vec<ShotEvent>,
    ) -> Self {
        let detected_shot = detected_shots.last().cloned();
        Self {
            frame_count,
            good_points,
            errors,
            detected_shots,
            detected_shot,
        }
    }
}

/// A training course suggested from the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Feedback titles and shot types this course addresses
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The `result` payload of a successful job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisOutcome {
    /// Always "success"
    pub status: String,
    /// Public path of the annotated video
    pub video_url: String,
    pub details: AnalysisResult,
    pub recommended_courses: Vec<Course>,
}

impl AnalysisOutcome {
    pub fn new(job_id: &str, details: AnalysisResult, recommended_courses: Vec<Course>) -> Self {
        Self {
            status: "success".to_string(),
            video_url: format!("/outputs/{}_annotated.mp4", job_id),
            details,
            recommended_courses,
        }
    }
}
