//! Shot event detection with distance gating, debounce and type-change dedup.

use std::sync::Arc;

use rally_models::{FeedbackItem, LandmarkSet, PoseLandmark, ShotEvent};
use tracing::{debug, trace};

use crate::config::{DominantHand, PipelineConfig};
use crate::rules::{ShotCandidate, TechniqueRules};

/// Result of classifying one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameAssessment {
    pub good: Vec<FeedbackItem>,
    pub bad: Vec<FeedbackItem>,
    /// Candidates the rules proposed this frame
    pub candidates: usize,
    /// Shots accepted this frame
    pub accepted: Vec<ShotEvent>,
}

/// Why a candidate shot was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingWrist,
    TooFar,
    Debounced,
    SameType,
}

/// Stateful shot detector for one video.
pub struct ShotDetector {
    rules: Arc<dyn TechniqueRules>,
    wrist: PoseLandmark,
    distance_threshold: f64,
    debounce_frames: u64,
    shots: Vec<ShotEvent>,
    last_shot_frame: u64,
}

impl ShotDetector {
    pub fn new(rules: Arc<dyn TechniqueRules>, config: &PipelineConfig) -> Self {
        let wrist = match config.dominant_hand {
            DominantHand::Right => PoseLandmark::RightWrist,
            DominantHand::Left => PoseLandmark::LeftWrist,
        };
        Self {
            rules,
            wrist,
            distance_threshold: config.wrist_distance_threshold,
            debounce_frames: config.debounce_frames,
            shots: Vec::new(),
            last_shot_frame: 0,
        }
    }

    /// Classify a frame and gate any proposed shots.
    ///
    /// Frames without landmarks produce nothing.
    pub fn classify(
        &mut self,
        landmarks: Option<&LandmarkSet>,
        ball: (i32, i32),
        frame_dims: (u32, u32),
        timestamp: f64,
        frame_index: u64,
    ) -> FrameAssessment {
        let Some(landmarks) = landmarks else {
            return FrameAssessment::default();
        };

        let eval = self.rules.evaluate(landmarks, ball, frame_dims, timestamp);
        let wrist = landmarks
            .get(self.wrist)
            .map(|l| l.to_pixels(frame_dims.0, frame_dims.1));

        let mut assessment = FrameAssessment {
            good: eval.good,
            bad: eval.bad,
            candidates: eval.shots.len(),
            accepted: Vec::new(),
        };

        for candidate in eval.shots {
            match self.gate(&candidate, wrist, ball, frame_index) {
                Ok(event) => {
                    debug!(
                        shot_type = %event.shot_type,
                        time = event.time,
                        wrist_distance = event.wrist_distance,
                        frame_index,
                        "Shot accepted"
                    );
                    assessment.accepted.push(event);
                }
                Err(reason) => {
                    trace!(shot_type = %candidate.shot_type, frame_index, ?reason, "Shot rejected");
                }
            }
        }

        assessment
    }

    /// Apply the acceptance rules to one candidate.
    pub fn gate(
        &mut self,
        candidate: &ShotCandidate,
        wrist: Option<(i32, i32)>,
        ball: (i32, i32),
        frame_index: u64,
    ) -> Result<ShotEvent, Rejection> {
        let (wx, wy) = wrist.ok_or(Rejection::MissingWrist)?;
        let dx = (ball.0 - wx) as f64;
        let dy = (ball.1 - wy) as f64;
        let distance = (dx * dx + dy * dy).sqrt();

        if distance > self.distance_threshold {
            return Err(Rejection::TooFar);
        }

        if let Some(last) = self.shots.last() {
            if frame_index.saturating_sub(self.last_shot_frame) < self.debounce_frames {
                return Err(Rejection::Debounced);
            }
            if last.shot_type == candidate.shot_type {
                return Err(Rejection::SameType);
            }
        }

        let event = ShotEvent::new(candidate.shot_type.clone(), candidate.time, distance);
        self.shots.push(event.clone());
        self.last_shot_frame = frame_index;
        Ok(event)
    }

    /// Accepted shots so far, in acceptance order.
    pub fn shots(&self) -> &[ShotEvent] {
        &self.shots
    }

    pub fn into_shots(self) -> Vec<ShotEvent> {
        self.shots
    }
}
