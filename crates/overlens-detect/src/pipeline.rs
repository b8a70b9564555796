//! Inference pipelines: frame in, optional [`Prediction`] out.
//!
//! Each pipeline owns a [`Preprocessor`] and one or more [`TensorModel`]s
//! and knows how to decode its model's raw outputs.

use crate::{
    coco_label, non_max_suppression, softmax, top_k, Classification, DetectError, DetectedObject,
    DetectedPose, FaceAlignment, NormalizedBox, NormalizedPoint, PoseLandmark, Prediction, Result,
    MOVENET_EDGES, MOVENET_KEYPOINTS,
};
use image::imageops;
use log::{debug, trace};
use ndarray::{Array4, ArrayD, ArrayView1};
use overlens_camera::YuvFrame;
use overlens_preprocess::Preprocessor;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What a pipeline produces. Pipelines are listed grouped in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Detection,
    Classification,
    PoseDetection,
    FaceAlignment,
}

/// A loaded network: one batch tensor in, every output tensor out.
pub trait TensorModel: Send {
    fn run(&mut self, input: Array4<f32>) -> Result<Vec<ArrayD<f32>>>;
}

impl<F> TensorModel for F
where
    F: FnMut(Array4<f32>) -> Result<Vec<ArrayD<f32>>> + Send,
{
    fn run(&mut self, input: Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
        self(input)
    }
}

/// Backend-agnostic analysis step run on the analysis thread.
pub trait InferencePipeline: Send {
    fn name(&self) -> &str;
    fn task(&self) -> Task;
    /// `Ok(None)` means the model ran but found nothing worth reporting.
    fn analyze(&mut self, frame: &YuvFrame) -> Result<Option<Prediction>>;
}

fn flat_output(outputs: &[ArrayD<f32>], index: usize) -> Result<Vec<f32>> {
    outputs
        .get(index)
        .map(|o| o.iter().copied().collect())
        .ok_or(DetectError::MissingOutput { index, got: outputs.len() })
}

fn bad_shape(outputs: &[ArrayD<f32>], index: usize) -> DetectError {
    let shape = outputs.get(index).map(|o| o.shape().to_vec()).unwrap_or_default();
    DetectError::InvalidOutputShape { index, shape }
}

// ------------------------------------------------------------
// classification
// ------------------------------------------------------------

pub struct ClassificationPipeline<M> {
    name: String,
    model: M,
    preprocessor: Preprocessor,
    labels: Vec<String>,
    apply_softmax: bool,
}

impl<M: TensorModel> ClassificationPipeline<M> {
    /// Logits are passed through softmax unless [`Self::with_probabilities`] is set.
    pub fn new(name: impl Into<String>, model: M, preprocessor: Preprocessor, labels: Vec<String>) -> Self {
        Self { name: name.into(), model, preprocessor, labels, apply_softmax: true }
    }

    /// The model already emits probabilities.
    pub fn with_probabilities(mut self) -> Self {
        self.apply_softmax = false;
        self
    }
}

impl<M: TensorModel> InferencePipeline for ClassificationPipeline<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> Task {
        Task::Classification
    }

    fn analyze(&mut self, frame: &YuvFrame) -> Result<Option<Prediction>> {
        let outputs = self.model.run(self.preprocessor.run(frame)?)?;
        let logits = flat_output(&outputs, 0)?;
        let view = ArrayView1::from(&logits[..]);
        let probs = if self.apply_softmax { softmax(view) } else { view.to_owned() };

        let Some(&(class_id, confidence)) = top_k(probs.view(), 1).first() else {
            return Ok(None);
        };
        let label = self
            .labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class {class_id}"));
        trace!("{}: {label} {confidence:.3}", self.name);
        Ok(Some(Prediction::Class(Classification { class_id, label, confidence })))
    }
}

// ------------------------------------------------------------
// SSD-style object detection
// ------------------------------------------------------------

/// Output positions of the box, class and score tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsdOutputs {
    pub boxes: usize,
    pub classes: usize,
    pub scores: usize,
}

impl Default for SsdOutputs {
    fn default() -> Self {
        Self { boxes: 0, classes: 1, scores: 2 }
    }
}

/// Decodes `[1, N, 4]` boxes (`ymin, xmin, ymax, xmax`), `[1, N]` COCO
/// class ids and `[1, N]` scores.
pub struct SsdDetectionPipeline<M> {
    name: String,
    model: M,
    preprocessor: Preprocessor,
    outputs: SsdOutputs,
    score_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl<M: TensorModel> SsdDetectionPipeline<M> {
    pub fn new(name: impl Into<String>, model: M, preprocessor: Preprocessor) -> Self {
        Self {
            name: name.into(),
            model,
            preprocessor,
            outputs: SsdOutputs::default(),
            score_threshold: 0.5,
            iou_threshold: 0.5,
            max_detections: 1,
        }
    }

    pub fn with_outputs(mut self, outputs: SsdOutputs) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_thresholds(mut self, score: f32, iou: f32) -> Self {
        self.score_threshold = score;
        self.iou_threshold = iou;
        self
    }

    pub fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max.max(1);
        self
    }
}

impl<M: TensorModel> InferencePipeline for SsdDetectionPipeline<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> Task {
        Task::Detection
    }

    fn analyze(&mut self, frame: &YuvFrame) -> Result<Option<Prediction>> {
        let outputs = self.model.run(self.preprocessor.run(frame)?)?;
        let boxes = flat_output(&outputs, self.outputs.boxes)?;
        let classes = flat_output(&outputs, self.outputs.classes)?;
        let scores = flat_output(&outputs, self.outputs.scores)?;

        let n = scores.len();
        if boxes.len() != n * 4 {
            return Err(bad_shape(&outputs, self.outputs.boxes));
        }
        if classes.len() != n {
            return Err(bad_shape(&outputs, self.outputs.classes));
        }

        let candidates: Vec<DetectedObject> = boxes
            .chunks_exact(4)
            .zip(classes.iter().zip(&scores))
            .filter(|(_, (_, score))| **score >= self.score_threshold)
            .map(|(b, (&class, &score))| {
                let class_id = class.round().max(0.0) as u32;
                DetectedObject {
                    bbox: NormalizedBox::from_yxyx([b[0], b[1], b[2], b[3]]).clamped(),
                    score,
                    class_id,
                    label: coco_label(class_id)
                        .map(str::to_owned)
                        .unwrap_or_else(|| format!("class {class_id}")),
                }
            })
            .collect();

        debug!("{}: {} of {n} candidates above {}", self.name, candidates.len(), self.score_threshold);
        let objects = non_max_suppression(candidates, self.iou_threshold, self.max_detections);
        if objects.is_empty() {
            return Ok(None);
        }
        Ok(Some(Prediction::Objects { objects }))
    }
}

// ------------------------------------------------------------
// single-pose (MoveNet)
// ------------------------------------------------------------

/// Decodes a MoveNet `[1, 1, 17, 3]` output of `(y, x, score)` triples.
pub struct PosePipeline<M> {
    name: String,
    model: M,
    preprocessor: Preprocessor,
    min_score: f32,
}

impl<M: TensorModel> PosePipeline<M> {
    pub fn new(name: impl Into<String>, model: M, preprocessor: Preprocessor) -> Self {
        Self { name: name.into(), model, preprocessor, min_score: 0.2 }
    }

    /// Edges touching a landmark below this score are not reported.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }
}

impl<M: TensorModel> InferencePipeline for PosePipeline<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> Task {
        Task::PoseDetection
    }

    fn analyze(&mut self, frame: &YuvFrame) -> Result<Option<Prediction>> {
        let outputs = self.model.run(self.preprocessor.run(frame)?)?;
        let raw = flat_output(&outputs, 0)?;
        if raw.len() != MOVENET_KEYPOINTS.len() * 3 {
            return Err(bad_shape(&outputs, 0));
        }

        let landmarks: Vec<PoseLandmark> = raw
            .chunks_exact(3)
            .map(|t| PoseLandmark { point: NormalizedPoint::new(t[1], t[0]), score: t[2] })
            .collect();
        if landmarks.iter().all(|l| l.score < self.min_score) {
            return Ok(None);
        }

        let edges = MOVENET_EDGES
            .iter()
            .copied()
            .filter(|&(a, b)| {
                landmarks[a].score >= self.min_score && landmarks[b].score >= self.min_score
            })
            .collect();
        let score = landmarks.iter().map(|l| l.score).sum::<f32>() / landmarks.len() as f32;
        Ok(Some(Prediction::Pose(DetectedPose { landmarks, edges, score })))
    }
}

// ------------------------------------------------------------
// face detection + alignment
// ------------------------------------------------------------

/// Two-stage face pipeline.
///
/// The detector yields `[1, N, 2]` background/face scores and `[1, N, 4]`
/// corner boxes; the best face is cropped (with a margin) and handed to
/// the aligner, whose `(x, y)` pairs are relative to that crop.
pub struct FaceAlignmentPipeline<D, A> {
    name: String,
    detector: D,
    aligner: A,
    detector_input: Preprocessor,
    aligner_input: Preprocessor,
    score_threshold: f32,
}

impl<D: TensorModel, A: TensorModel> FaceAlignmentPipeline<D, A> {
    pub fn new(
        name: impl Into<String>,
        detector: D,
        detector_input: Preprocessor,
        aligner: A,
        aligner_input: Preprocessor,
    ) -> Self {
        Self {
            name: name.into(),
            detector,
            aligner,
            detector_input,
            aligner_input,
            score_threshold: 0.7,
        }
    }

    pub fn with_score_threshold(mut self, score: f32) -> Self {
        self.score_threshold = score;
        self
    }
}

impl<D: TensorModel, A: TensorModel> InferencePipeline for FaceAlignmentPipeline<D, A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> Task {
        Task::FaceAlignment
    }

    fn analyze(&mut self, frame: &YuvFrame) -> Result<Option<Prediction>> {
        let rgb = self.detector_input.frame_to_rgb(frame)?;
        let outputs = self.detector.run(self.detector_input.run_image(&rgb)?)?;
        let scores = flat_output(&outputs, 0)?;
        let boxes = flat_output(&outputs, 1)?;
        if scores.len() % 2 != 0 || boxes.len() != scores.len() * 2 {
            return Err(bad_shape(&outputs, 1));
        }

        let faces: Vec<DetectedObject> = boxes
            .chunks_exact(4)
            .zip(scores.chunks_exact(2))
            .filter(|(_, s)| s[1] >= self.score_threshold)
            .map(|(b, s)| DetectedObject {
                bbox: NormalizedBox::new(b[0], b[1], b[2], b[3]).clamped(),
                score: s[1],
                class_id: 1,
                label: String::from("face"),
            })
            .collect();
        let Some(face) = non_max_suppression(faces, 0.3, 1).into_iter().next() else {
            return Ok(None);
        };

        // Grow the face box a little so the aligner sees the whole head.
        let (w, h) = (rgb.width() as f32, rgb.height() as f32);
        let x0 = (face.bbox.left * 0.9 * w).max(0.0) as u32;
        let y0 = (face.bbox.top * 0.9 * h).max(0.0) as u32;
        let x1 = (face.bbox.right * 1.1 * w).min(w) as u32;
        let y1 = (face.bbox.bottom * 1.1 * h).min(h) as u32;
        if x1 <= x0 || y1 <= y0 {
            return Ok(None);
        }
        let (cw, ch) = (x1 - x0, y1 - y0);
        let crop = imageops::crop_imm(&rgb, x0, y0, cw, ch).to_image();

        let aligned = self.aligner.run(self.aligner_input.run_image(&crop)?)?;
        let raw = flat_output(&aligned, 0)?;
        if raw.len() % 2 != 0 {
            return Err(bad_shape(&aligned, 0));
        }
        let landmarks = raw
            .chunks_exact(2)
            .map(|p| {
                NormalizedPoint::new(
                    (x0 as f32 + p[0] * cw as f32) / w,
                    (y0 as f32 + p[1] * ch as f32) / h,
                )
            })
            .collect();

        Ok(Some(Prediction::Face(FaceAlignment {
            face: face.bbox,
            score: face.score,
            landmarks,
        })))
    }
}

// ------------------------------------------------------------
// replay
// ------------------------------------------------------------

/// Plays back recorded predictions, one per frame, looping forever.
///
/// The JSON form is an array whose entries are a tagged [`Prediction`]
/// or `null` for frames without a result.
pub struct ReplayPipeline {
    name: String,
    task: Task,
    frames: Vec<Option<Prediction>>,
    cursor: usize,
}

impl ReplayPipeline {
    pub fn new(name: impl Into<String>, task: Task, frames: Vec<Option<Prediction>>) -> Self {
        Self { name: name.into(), task, frames, cursor: 0 }
    }

    pub fn from_json_str(name: impl Into<String>, task: Task, json: &str) -> Result<Self> {
        Ok(Self::new(name, task, serde_json::from_str(json)?))
    }

    pub fn from_json_file(name: impl Into<String>, task: Task, path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(name, task, &json)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl InferencePipeline for ReplayPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    fn task(&self) -> Task {
        self.task
    }

    fn analyze(&mut self, _frame: &YuvFrame) -> Result<Option<Prediction>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        let out = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(out)
    }
}
