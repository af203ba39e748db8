//! Ball position tracking.
//!
//! Fuses object-detector boxes with the frame-diff motion finder into a
//! single best-estimate position per frame, and keeps an aged history used
//! for drawing the trail.

use std::collections::VecDeque;

use image::RgbImage;
use rally_models::{BallObservation, Detection};
use tracing::trace;

use crate::config::PipelineConfig;
use crate::motion::BallMotionDetector;

/// Where this frame's ball estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallSource {
    Detector,
    Motion,
    /// No new estimate; the last known position was reused.
    History,
}

/// Tracks the ball across frames.
pub struct BallTracker {
    motion: BallMotionDetector,
    history: VecDeque<BallObservation>,
    labels: Vec<String>,
    capacity: usize,
    max_age: u32,
    last_frame: Option<u64>,
}

impl BallTracker {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            motion: BallMotionDetector::new(),
            history: VecDeque::with_capacity(config.trail_capacity),
            labels: config.ball_labels.clone(),
            capacity: config.trail_capacity.max(1),
            max_age: config.trail_max_age,
            last_frame: None,
        }
    }

    /// Highest-confidence detection whose label is ball-like.
    pub fn select_ball<'a>(&self, detections: &'a [Detection]) -> Option<&'a Detection> {
        detections
            .iter()
            .filter(|d| d.is_labelled_as(&self.labels))
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    }

    /// Update with one frame and return the best-known ball position.
    ///
    /// Never fails: with no estimate at all the most recent history entry is
    /// returned, or `None` when history is empty.
    pub fn observe(
        &mut self,
        frame: &RgbImage,
        detections: &[Detection],
        frame_index: u64,
    ) -> (Option<(i32, i32)>, BallSource) {
        if self.last_frame != Some(frame_index) {
            self.age_history();
            self.last_frame = Some(frame_index);
        }

        // Always feed the motion finder so its reference frame stays current.
        let motion = self.motion.detect_center(frame);

        let source = if let Some(ball) = self.select_ball(detections) {
            let center = ball.bbox.center_px();
            self.record(center);
            BallSource::Detector
        } else if let Some(center) = motion {
            self.record(center);
            BallSource::Motion
        } else {
            BallSource::History
        };

        trace!(frame_index, ?source, trail = self.history.len(), "Ball observed");
        (self.current(), source)
    }

    /// Append `position` unless it equals the latest entry, which is
    /// refreshed instead.
    pub fn record(&mut self, position: (i32, i32)) {
        match self.history.back_mut() {
            Some(last) if last.position == position => last.age = 0,
            _ => {
                self.history.push_back(BallObservation::fresh(position));
                while self.history.len() > self.capacity {
                    self.history.pop_front();
                }
            }
        }
    }

    fn age_history(&mut self) {
        for obs in self.history.iter_mut() {
            obs.age = obs.age.saturating_add(1);
        }
        let max_age = self.max_age;
        self.history.retain(|obs| obs.age <= max_age);
    }

    /// Most recent known position.
    pub fn current(&self) -> Option<(i32, i32)> {
        self.history.back().map(|o| o.position)
    }

    /// Most recent known position, or `fallback` when nothing is known.
    pub fn current_or(&self, fallback: (i32, i32)) -> (i32, i32) {
        self.current().unwrap_or(fallback)
    }

    /// Trail entries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &BallObservation> {
        self.history.iter()
    }
}
