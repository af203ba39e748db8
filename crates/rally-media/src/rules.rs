//! Technique rules: per-frame stroke classification and posture feedback.
//!
//! The frame pipeline treats rule evaluation as a black box behind
//! [`TechniqueRules`]. [`BasicStrokeRules`] is a small geometric default.

use rally_models::{FeedbackItem, LandmarkSet, PoseLandmark};

use crate::config::DominantHand;

/// A stroke proposed by the rules for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotCandidate {
    pub shot_type: String,
    pub time: f64,
}

/// Output of one rule evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleEvaluation {
    pub good: Vec<FeedbackItem>,
    pub bad: Vec<FeedbackItem>,
    pub shots: Vec<ShotCandidate>,
}

/// Classifies strokes and produces technique feedback from one frame of pose.
pub trait TechniqueRules: Send + Sync {
    fn evaluate(
        &self,
        landmarks: &LandmarkSet,
        ball: (i32, i32),
        frame_dims: (u32, u32),
        timestamp: f64,
    ) -> RuleEvaluation;

    fn name(&self) -> &'static str;
}

/// Joint-angle heuristics for stance and stroke side.
#[derive(Debug, Clone)]
pub struct BasicStrokeRules {
    hand: DominantHand,
    min_visibility: f32,
    /// Elbow angle (degrees) above which the racquet arm counts as swinging
    extension_angle: f32,
}

impl BasicStrokeRules {
    pub fn new(hand: DominantHand, min_visibility: f32) -> Self {
        Self {
            hand,
            min_visibility,
            extension_angle: 150.0,
        }
    }

    fn arm(&self) -> (PoseLandmark, PoseLandmark, PoseLandmark) {
        match self.hand {
            DominantHand::Right => (
                PoseLandmark::RightShoulder,
                PoseLandmark::RightElbow,
                PoseLandmark::RightWrist,
            ),
            DominantHand::Left => (
                PoseLandmark::LeftShoulder,
                PoseLandmark::LeftElbow,
                PoseLandmark::LeftWrist,
            ),
        }
    }

    fn point(&self, set: &LandmarkSet, kind: PoseLandmark, dims: (u32, u32)) -> Option<(f32, f32)> {
        set.visible(kind, self.min_visibility)
            .map(|l| (l.x * dims.0 as f32, l.y * dims.1 as f32))
    }

    fn classify_stroke(&self, set: &LandmarkSet, dims: (u32, u32)) -> Option<&'static str> {
        let (shoulder, elbow, wrist) = self.arm();
        let s = self.point(set, shoulder, dims)?;
        let e = self.point(set, elbow, dims)?;
        let w = self.point(set, wrist, dims)?;

        if joint_angle(s, e, w) < self.extension_angle {
            return None;
        }

        if w.1 < s.1 {
            return Some("overhead");
        }

        let ls = self.point(set, PoseLandmark::LeftShoulder, dims)?;
        let rs = self.point(set, PoseLandmark::RightShoulder, dims)?;
        let mid_x = (ls.0 + rs.0) / 2.0;
        // Forehand when the wrist stays on the racquet-shoulder side of the torso.
        let same_side = (w.0 - mid_x).signum() == (s.0 - mid_x).signum();
        Some(if same_side { "forehand" } else { "backhand" })
    }

    fn stance_feedback(&self, set: &LandmarkSet, dims: (u32, u32), eval: &mut RuleEvaluation) {
        use PoseLandmark::*;

        let legs = [(LeftHip, LeftKnee, LeftAnkle), (RightHip, RightKnee, RightAnkle)];
        let angles: Vec<f32> = legs
            .iter()
            .filter_map(|&(h, k, a)| {
                Some(joint_angle(
                    self.point(set, h, dims)?,
                    self.point(set, k, dims)?,
                    self.point(set, a, dims)?,
                ))
            })
            .collect();

        if !angles.is_empty() {
            let mean = angles.iter().sum::<f32>() / angles.len() as f32;
            if mean > 165.0 {
                eval.bad.push(FeedbackItem::bad(
                    "Straight legs",
                    "Bend your knees to stay low and ready",
                ));
            } else if mean < 160.0 {
                eval.good.push(FeedbackItem::good("Athletic stance", "Knees bent and balanced"));
            }
        }

        let feet = self
            .point(set, LeftAnkle, dims)
            .zip(self.point(set, RightAnkle, dims));
        let shoulders = self
            .point(set, LeftShoulder, dims)
            .zip(self.point(set, RightShoulder, dims));
        if let (Some((la, ra)), Some((ls, rs))) = (feet, shoulders) {
            let stance = distance(la, ra);
            let width = distance(ls, rs);
            if width > 1.0 {
                if stance < 0.8 * width {
                    eval.bad.push(FeedbackItem::bad(
                        "Narrow base",
                        "Keep your feet about shoulder width apart",
                    ));
                } else {
                    eval.good.push(FeedbackItem::good("Solid base", "Feet set wider than shoulders"));
                }
            }
        }

        let (_, _, wrist) = self.arm();
        let hips = self
            .point(set, LeftHip, dims)
            .zip(self.point(set, RightHip, dims));
        if let (Some(w), Some((lh, rh))) = (self.point(set, wrist, dims), hips) {
            let hip_y = (lh.1 + rh.1) / 2.0;
            if w.1 <= hip_y {
                eval.good.push(FeedbackItem::good("Paddle up", "Paddle held in front at ready height"));
            } else {
                eval.bad.push(FeedbackItem::bad(
                    "Paddle low",
                    "Raise the paddle above your waist between shots",
                ));
            }
        }
    }
}

impl Default for BasicStrokeRules {
    fn default() -> Self {
        Self::new(DominantHand::Right, 0.5)
    }
}

impl TechniqueRules for BasicStrokeRules {
    fn evaluate(
        &self,
        landmarks: &LandmarkSet,
        _ball: (i32, i32),
        frame_dims: (u32, u32),
        timestamp: f64,
    ) -> RuleEvaluation {
        let mut eval = RuleEvaluation::default();
        self.stance_feedback(landmarks, frame_dims, &mut eval);
        if let Some(shot) = self.classify_stroke(landmarks, frame_dims) {
            eval.shots.push(ShotCandidate {
                shot_type: shot.to_string(),
                time: timestamp,
            });
        }
        eval
    }

    fn name(&self) -> &'static str {
        "basic-stroke-rules"
    }
}

/// Angle at `b` in degrees for the path `a -> b -> c`.
pub fn joint_angle(a: (f32, f32), b: (f32, f32), c: (f32, f32)) -> f32 {
    let v1 = (a.0 - b.0, a.1 - b.1);
    let v2 = (c.0 - b.0, c.1 - b.1);
    let n1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let n2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if n1 == 0.0 || n2 == 0.0 {
        return 0.0;
    }
    let cos = ((v1.0 * v2.0 + v1.1 * v2.1) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}
