//! Turns an [`AnalysisResult`] into drawable view-space primitives.

use crate::{PixelPoint, PixelRect, PreviewBounds, ScaleMode};
use overlens_detect::{AnalysisResult, Prediction};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Rect { rect: PixelRect, stroke: f32, label: String },
    Line { from: PixelPoint, to: PixelPoint, stroke: f32 },
    Dot { at: PixelPoint, radius: f32 },
    /// Text-only result (classification); anchored at the view's top-left.
    Caption { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayMapper {
    pub view_width: u32,
    pub view_height: u32,
    pub scale_mode: ScaleMode,
    /// Full-confidence stroke width; actual strokes scale with the score.
    pub stroke_width: f32,
    pub landmark_radius: f32,
}

impl OverlayMapper {
    pub fn new(view_width: u32, view_height: u32, scale_mode: ScaleMode) -> Self {
        Self { view_width, view_height, scale_mode, stroke_width: 6.0, landmark_radius: 3.0 }
    }

    pub fn bounds(&self, result: &AnalysisResult) -> Option<PreviewBounds> {
        let meta = &result.metadata;
        PreviewBounds::compute(
            meta.width,
            meta.height,
            self.view_width,
            self.view_height,
            self.scale_mode,
            meta.flipped,
        )
    }

    pub fn map(&self, result: &AnalysisResult) -> Vec<Overlay> {
        let Some(bounds) = self.bounds(result) else {
            return Vec::new();
        };

        match &result.prediction {
            Prediction::Objects { objects } => objects
                .iter()
                .map(|o| Overlay::Rect {
                    rect: bounds.map_box(&o.bbox),
                    stroke: self.stroke_width * o.score,
                    label: o.text(),
                })
                .collect(),
            Prediction::Pose(pose) => {
                let stroke = self.stroke_width * pose.score;
                let mut out = Vec::with_capacity(pose.edges.len() * 2);
                let mut joints = BTreeSet::new();
                for &(a, b) in &pose.edges {
                    let (Some(la), Some(lb)) = (pose.landmarks.get(a), pose.landmarks.get(b)) else {
                        continue;
                    };
                    out.push(Overlay::Line {
                        from: bounds.map_point(la.point),
                        to: bounds.map_point(lb.point),
                        stroke,
                    });
                    joints.extend([a, b]);
                }
                out.extend(joints.into_iter().map(|i| Overlay::Dot {
                    at: bounds.map_point(pose.landmarks[i].point),
                    radius: self.landmark_radius,
                }));
                out
            }
            Prediction::Face(face) => {
                let mut out = vec![Overlay::Rect {
                    rect: bounds.map_box(&face.face),
                    stroke: self.stroke_width * face.score,
                    label: result.prediction.text(),
                }];
                out.extend(face.landmarks.iter().map(|&p| Overlay::Dot {
                    at: bounds.map_point(p),
                    radius: self.landmark_radius,
                }));
                out
            }
            Prediction::Class(_) => vec![Overlay::Caption { text: result.prediction.text() }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlens_detect::{
        DetectedObject, DetectedPose, ImageMetadata, NormalizedBox, NormalizedPoint, PoseLandmark,
    };
    use std::time::Duration;

    fn result(prediction: Prediction, flipped: bool) -> AnalysisResult {
        AnalysisResult {
            prediction,
            process_time: Duration::from_millis(5),
            metadata: ImageMetadata::new(100, 100, flipped, 0),
        }
    }

    #[test]
    fn object_stroke_scales_with_score() {
        let p = Prediction::Objects {
            objects: vec![DetectedObject {
                bbox: NormalizedBox::new(0.0, 0.0, 0.5, 0.5),
                score: 0.5,
                class_id: 1,
                label: "person".into(),
            }],
        };
        let out = OverlayMapper::new(200, 200, ScaleMode::FillCenter).map(&result(p, false));
        assert_eq!(
            out,
            vec![Overlay::Rect {
                rect: PixelRect { left: 0.0, top: 0.0, right: 100.0, bottom: 100.0 },
                stroke: 3.0,
                label: "person : 0.50".into(),
            }]
        );
    }

    #[test]
    fn pose_draws_edges_and_their_joints() {
        let lm = |x, y| PoseLandmark { point: NormalizedPoint::new(x, y), score: 1.0 };
        let pose = DetectedPose {
            landmarks: vec![lm(0.0, 0.0), lm(1.0, 1.0), lm(0.5, 0.5)],
            edges: vec![(0, 1), (1, 7)],
            score: 1.0,
        };
        let out = OverlayMapper::new(10, 10, ScaleMode::FitCenter).map(&result(Prediction::Pose(pose), true));
        let lines = out.iter().filter(|o| matches!(o, Overlay::Line { .. })).count();
        let dots = out.iter().filter(|o| matches!(o, Overlay::Dot { .. })).count();
        assert_eq!((lines, dots), (1, 2));
        match &out[0] {
            Overlay::Line { from, to, .. } => {
                assert_eq!(*from, PixelPoint { x: 10.0, y: 0.0 });
                assert_eq!(*to, PixelPoint { x: 0.0, y: 10.0 });
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_view_maps_to_nothing() {
        let p = Prediction::Objects { objects: Vec::new() };
        assert!(OverlayMapper::new(0, 480, ScaleMode::FillCenter).map(&result(p, false)).is_empty());
    }
}
