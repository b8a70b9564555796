//! Built-in detector for the synthetic source: reports where the moving
//! marker square is, so the overlay path can run without a model.

use overlens_camera::{SyntheticCamera, YuvFrame};
use overlens_detect::{
    DetectedObject, InferencePipeline, NormalizedBox, NormalizedPoint, Prediction, Result, Task,
};

pub struct MarkerTracker {
    camera: SyntheticCamera,
}

impl MarkerTracker {
    /// `camera` only supplies the marker geometry; it is never read from.
    pub fn new(camera: SyntheticCamera) -> Self {
        Self { camera }
    }
}

/// Rotate a normalized point clockwise, matching the upright RGB image.
fn rotate_point(p: NormalizedPoint, degrees: u32) -> NormalizedPoint {
    match degrees % 360 {
        90 => NormalizedPoint::new(1.0 - p.y, p.x),
        180 => NormalizedPoint::new(1.0 - p.x, 1.0 - p.y),
        270 => NormalizedPoint::new(p.y, 1.0 - p.x),
        _ => p,
    }
}

fn rotate_box(b: NormalizedBox, degrees: u32) -> NormalizedBox {
    let a = rotate_point(NormalizedPoint::new(b.left, b.top), degrees);
    let c = rotate_point(NormalizedPoint::new(b.right, b.bottom), degrees);
    NormalizedBox::new(a.x.min(c.x), a.y.min(c.y), a.x.max(c.x), a.y.max(c.y))
}

impl InferencePipeline for MarkerTracker {
    fn name(&self) -> &str {
        "marker-tracker"
    }

    fn task(&self) -> Task {
        Task::Detection
    }

    fn analyze(&mut self, frame: &YuvFrame) -> Result<Option<Prediction>> {
        let m = self.camera.marker_rect(frame.sequence);
        let c = frame.crop;
        let (l, t) = (m.left.max(c.left), m.top.max(c.top));
        let (r, b) = (m.right.min(c.right), m.bottom.min(c.bottom));
        if r <= l || b <= t {
            return Ok(None);
        }

        let (cw, ch) = (c.width() as f32, c.height() as f32);
        let bbox = NormalizedBox::new(
            (l - c.left) as f32 / cw,
            (t - c.top) as f32 / ch,
            (r - c.left) as f32 / cw,
            (b - c.top) as f32 / ch,
        );
        Ok(Some(Prediction::Objects {
            objects: vec![DetectedObject {
                bbox: rotate_box(bbox, frame.rotation_degrees),
                score: 0.9,
                class_id: 0,
                label: String::from("marker"),
            }],
        }))
    }
}
