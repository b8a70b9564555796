//! Result types produced by the pipelines.
//!
//! Every coordinate here is normalized to the upright analyzed image:
//! `(0, 0)` is the top-left corner, `(1, 1)` the bottom-right one.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Axis-aligned box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedBox {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Box decoded from the `[ymin, xmin, ymax, xmax]` order SSD heads emit.
    pub fn from_yxyx(v: [f32; 4]) -> Self {
        Self::new(v[1], v[0], v[3], v[2])
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Mirror around the vertical center line; left stays left of right.
    pub fn flip_horizontal(&self) -> Self {
        Self::new(1.0 - self.right, self.top, 1.0 - self.left, self.bottom)
    }

    pub fn clamped(&self) -> Self {
        Self::new(
            self.left.clamp(0.0, 1.0),
            self.top.clamp(0.0, 1.0),
            self.right.clamp(0.0, 1.0),
            self.bottom.clamp(0.0, 1.0),
        )
    }

    /// Intersection over union.
    pub fn iou(&self, other: &Self) -> f32 {
        let iw = (self.right.min(other.right) - self.left.max(other.left)).max(0.0);
        let ih = (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0);
        let inter = iw * ih;
        inter / (self.area() + other.area() - inter + 1e-6)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f32,
    pub y: f32,
}

impl NormalizedPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn flip_horizontal(&self) -> Self {
        Self::new(1.0 - self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub bbox: NormalizedBox,
    pub score: f32,
    pub class_id: u32,
    pub label: String,
}

impl DetectedObject {
    /// Caption drawn next to the box, e.g. `person : 0.87`.
    pub fn text(&self) -> String {
        format!("{} : {:.2}", self.label, self.score)
    }
}

/// MoveNet keypoint names, in model output order.
pub const MOVENET_KEYPOINTS: [&str; 17] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Skeleton edges between [`MOVENET_KEYPOINTS`] indices.
pub const MOVENET_EDGES: [(usize, usize); 18] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (0, 5),
    (0, 6),
    (5, 7),
    (7, 9),
    (6, 8),
    (8, 10),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmark {
    pub point: NormalizedPoint,
    pub score: f32,
}

/// Landmarks plus the edges (indices into `landmarks`) worth drawing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedPose {
    pub landmarks: Vec<PoseLandmark>,
    pub edges: Vec<(usize, usize)>,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAlignment {
    pub face: NormalizedBox,
    pub score: f32,
    pub landmarks: Vec<NormalizedPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub class_id: usize,
    pub label: String,
    pub confidence: f32,
}

/// One analysis outcome. Consumers match on every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prediction {
    Objects { objects: Vec<DetectedObject> },
    Pose(DetectedPose),
    Face(FaceAlignment),
    Class(Classification),
}

impl Prediction {
    pub fn confidence(&self) -> f32 {
        match self {
            Prediction::Objects { objects } => {
                objects.iter().map(|o| o.score).fold(0.0, f32::max)
            }
            Prediction::Pose(pose) => pose.score,
            Prediction::Face(face) => face.score,
            Prediction::Class(class) => class.confidence,
        }
    }

    /// Short caption for status lines.
    pub fn text(&self) -> String {
        match self {
            Prediction::Objects { objects } => match objects.first() {
                Some(first) => first.text(),
                None => String::from("no objects"),
            },
            Prediction::Pose(pose) => format!("pose : {:.2}", pose.score),
            Prediction::Face(face) => format!("face : {:.2}", face.score),
            Prediction::Class(class) => format!("{} : {:.2}", class.label, class.confidence),
        }
    }

    /// Same prediction mirrored horizontally.
    pub fn flipped(&self) -> Prediction {
        match self {
            Prediction::Objects { objects } => Prediction::Objects {
                objects: objects
                    .iter()
                    .map(|o| DetectedObject { bbox: o.bbox.flip_horizontal(), ..o.clone() })
                    .collect(),
            },
            Prediction::Pose(pose) => Prediction::Pose(DetectedPose {
                landmarks: pose
                    .landmarks
                    .iter()
                    .map(|l| PoseLandmark { point: l.point.flip_horizontal(), score: l.score })
                    .collect(),
                ..pose.clone()
            }),
            Prediction::Face(face) => Prediction::Face(FaceAlignment {
                face: face.face.flip_horizontal(),
                score: face.score,
                landmarks: face.landmarks.iter().map(NormalizedPoint::flip_horizontal).collect(),
            }),
            Prediction::Class(class) => Prediction::Class(class.clone()),
        }
    }
}

/// Geometry of the image a prediction was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub flipped: bool,
    pub rotation_degrees: u32,
}

impl ImageMetadata {
    /// `width`/`height` are sensor-oriented; they are swapped for quarter turns.
    pub fn new(width: u32, height: u32, flipped: bool, rotation_degrees: u32) -> Self {
        let (width, height) = match rotation_degrees % 360 {
            90 | 270 => (height, width),
            _ => (width, height),
        };
        Self { width, height, flipped, rotation_degrees }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub prediction: Prediction,
    pub process_time: Duration,
    pub metadata: ImageMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_keeps_left_of_right() {
        let b = NormalizedBox::new(0.1, 0.2, 0.4, 0.9).flip_horizontal();
        assert!((b.left - 0.6).abs() < 1e-6);
        assert!((b.right - 0.9).abs() < 1e-6);
        assert_eq!((b.top, b.bottom), (0.2, 0.9));
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = NormalizedBox::new(0.0, 0.0, 0.5, 0.5);
        let b = NormalizedBox::new(0.5, 0.5, 1.0, 1.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-4);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn yxyx_order_is_decoded() {
        let b = NormalizedBox::from_yxyx([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(b, NormalizedBox::new(0.2, 0.1, 0.4, 0.3));
    }

    #[test]
    fn metadata_swaps_for_quarter_turns() {
        assert_eq!(ImageMetadata::new(640, 480, false, 90).width, 480);
        assert_eq!(ImageMetadata::new(640, 480, false, 180).width, 640);
        assert_eq!(ImageMetadata::new(640, 480, true, 270).height, 640);
    }

    #[test]
    fn captions_use_two_decimals() {
        let p = Prediction::Class(Classification {
            class_id: 3,
            label: "cat".into(),
            confidence: 0.876,
        });
        assert_eq!(p.text(), "cat : 0.88");
        assert!((p.confidence() - 0.876).abs() < 1e-6);
    }

    #[test]
    fn prediction_json_is_tagged() {
        let p = Prediction::Objects {
            objects: vec![DetectedObject {
                bbox: NormalizedBox::new(0.0, 0.0, 1.0, 1.0),
                score: 0.5,
                class_id: 1,
                label: "person".into(),
            }],
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains(r#""kind":"objects""#));
        assert_eq!(serde_json::from_str::<Prediction>(&json).unwrap(), p);
    }

    #[test]
    fn flipped_pose_mirrors_landmarks_only() {
        let pose = DetectedPose {
            landmarks: vec![PoseLandmark { point: NormalizedPoint::new(0.25, 0.5), score: 0.9 }],
            edges: vec![(0, 0)],
            score: 0.9,
        };
        let Prediction::Pose(f) = Prediction::Pose(pose).flipped() else {
            panic!("variant changed");
        };
        assert_eq!(f.landmarks[0].point, NormalizedPoint::new(0.75, 0.5));
        assert_eq!(f.edges, vec![(0, 0)]);
    }
}
