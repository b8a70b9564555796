// overlens-detect/src/lib.rs
// ============================================================
// overlens-detect  –  inference pipelines + detection results
// ------------------------------------------------------------
// Pipeline: YuvFrame → Preprocessor → TensorModel → Prediction
// ------------------------------------------------------------
// Public API
//   * InferencePipeline::analyze(frame)  – Option<Prediction>
//   * ImageAnalyzer::analyze(frame, flip) – Option<AnalysisResult>
//   * Prediction = Objects | Pose | Face | Class
// ------------------------------------------------------------
//   Build notes
//     * No runtime is linked here. Backends implement TensorModel
//       (Array4 in, Vec<ArrayD> out) and plug into the pipelines.
//     * ReplayPipeline feeds recorded predictions without a model.
// ============================================================

//! Overlens – detection layer
//!
//! Results are always expressed in normalized (0‥1) coordinates of the
//! upright analyzed image; [`ImageMetadata`] carries the dimensions and
//! mirror flag needed to map them onto a preview later.

use thiserror::Error;

mod analyzer;
pub mod labels;
mod pipeline;
pub mod postprocess;
mod prediction;

pub use analyzer::{ImageAnalyzer, PipelineSelector};
pub use labels::coco_label;
pub use pipeline::{
    ClassificationPipeline, FaceAlignmentPipeline, InferencePipeline, PosePipeline, ReplayPipeline,
    SsdDetectionPipeline, SsdOutputs, Task, TensorModel,
};
pub use postprocess::{non_max_suppression, softmax, top_k};
pub use prediction::{
    AnalysisResult, Classification, DetectedObject, DetectedPose, FaceAlignment, ImageMetadata,
    NormalizedBox, NormalizedPoint, PoseLandmark, Prediction, MOVENET_EDGES, MOVENET_KEYPOINTS,
};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("Output {index} has unexpected shape {shape:?}")]
    InvalidOutputShape { index: usize, shape: Vec<usize> },
    #[error("Model returned {got} outputs, needed output #{index}")]
    MissingOutput { index: usize, got: usize },
    #[error("Pipeline index {index} out of range ({len} registered)")]
    InvalidPipelineIndex { index: usize, len: usize },
    #[error("Inference backend failed: {0}")]
    Backend(String),
    #[error("Replay data is malformed: {0}")]
    Replay(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Preprocess(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, DetectError>;
