//! Body pose landmarks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// COCO body keypoint layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PoseLandmark {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl PoseLandmark {
    pub const COUNT: usize = 17;

    pub const ALL: [PoseLandmark; Self::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    /// Limb connections drawn for the body skeleton (no face points).
    pub const BODY_CONNECTIONS: [(PoseLandmark, PoseLandmark); 12] = [
        (Self::LeftShoulder, Self::RightShoulder),
        (Self::LeftShoulder, Self::LeftElbow),
        (Self::LeftElbow, Self::LeftWrist),
        (Self::RightShoulder, Self::RightElbow),
        (Self::RightElbow, Self::RightWrist),
        (Self::LeftShoulder, Self::LeftHip),
        (Self::RightShoulder, Self::RightHip),
        (Self::LeftHip, Self::RightHip),
        (Self::LeftHip, Self::LeftKnee),
        (Self::LeftKnee, Self::LeftAnkle),
        (Self::RightHip, Self::RightKnee),
        (Self::RightKnee, Self::RightAnkle),
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Whether this point belongs to the body (shoulders and below).
    pub fn is_body(&self) -> bool {
        self.index() >= Self::LeftShoulder.index()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }
}

/// A single landmark with coordinates normalised to the frame (0..1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Landmark {
    pub kind: PoseLandmark,
    pub x: f32,
    pub y: f32,
    pub visibility: f32,
}

impl Landmark {
    pub fn new(kind: PoseLandmark, x: f32, y: f32, visibility: f32) -> Self {
        Self { kind, x, y, visibility }
    }

    /// Pixel position, truncating towards zero.
    pub fn to_pixels(&self, width: u32, height: u32) -> (i32, i32) {
        ((self.x * width as f32) as i32, (self.y * height as f32) as i32)
    }
}

/// All landmarks of one detected person in one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(mut landmarks: Vec<Landmark>) -> Self {
        landmarks.sort_by_key(|l| l.kind.index());
        landmarks.dedup_by_key(|l| l.kind);
        Self { landmarks }
    }

    pub fn get(&self, kind: PoseLandmark) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.kind == kind)
    }

    /// Landmark only when its visibility reaches `min_visibility`.
    pub fn visible(&self, kind: PoseLandmark, min_visibility: f32) -> Option<&Landmark> {
        self.get(kind).filter(|l| l.visibility >= min_visibility)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        for kind in PoseLandmark::ALL {
            assert_eq!(PoseLandmark::from_index(kind.index()), Some(kind));
        }
        assert_eq!(PoseLandmark::from_index(17), None);
        assert_eq!(PoseLandmark::RightWrist.index(), 10);
    }

    #[test]
    fn test_to_pixels_truncates() {
        let l = Landmark::new(PoseLandmark::RightWrist, 0.5, 0.333, 1.0);
        assert_eq!(l.to_pixels(301, 300), (150, 99));
    }

    #[test]
    fn test_landmark_set_lookup() {
        let set = LandmarkSet::new(vec![
            Landmark::new(PoseLandmark::RightWrist, 0.1, 0.2, 0.9),
            Landmark::new(PoseLandmark::Nose, 0.5, 0.1, 0.2),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next().unwrap().kind, PoseLandmark::Nose);
        assert!(set.get(PoseLandmark::RightWrist).is_some());
        assert!(set.visible(PoseLandmark::Nose, 0.5).is_none());
        assert!(set.get(PoseLandmark::LeftAnkle).is_none());
    }
}
