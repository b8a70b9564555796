//! Owns the registered pipelines and runs the selected one per frame.

use crate::{AnalysisResult, DetectError, ImageMetadata, InferencePipeline, Result, Task};
use log::{debug, info};
use overlens_camera::YuvFrame;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Instant;

const NONE_SELECTED: usize = usize::MAX;

/// Cheap handle for switching pipelines from outside the analysis thread.
#[derive(Debug, Clone)]
pub struct PipelineSelector {
    current: Arc<AtomicUsize>,
    len: usize,
}

impl PipelineSelector {
    pub fn select(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(DetectError::InvalidPipelineIndex { index, len: self.len });
        }
        self.current.store(index, Ordering::Release);
        Ok(())
    }

    /// Stop analyzing; every frame yields no result until a new selection.
    pub fn clear(&self) {
        self.current.store(NONE_SELECTED, Ordering::Release);
    }

    pub fn current(&self) -> Option<usize> {
        match self.current.load(Ordering::Acquire) {
            NONE_SELECTED => None,
            i => Some(i),
        }
    }
}

pub struct ImageAnalyzer {
    pipelines: Vec<Box<dyn InferencePipeline>>,
    selector: PipelineSelector,
}

impl ImageAnalyzer {
    /// Pipelines are grouped by [`Task`], keeping registration order
    /// within a task. The first one starts selected.
    pub fn new(mut pipelines: Vec<Box<dyn InferencePipeline>>) -> Self {
        pipelines.sort_by_key(|p| p.task());
        let first = if pipelines.is_empty() { NONE_SELECTED } else { 0 };
        let selector = PipelineSelector {
            current: Arc::new(AtomicUsize::new(first)),
            len: pipelines.len(),
        };
        for (i, p) in pipelines.iter().enumerate() {
            info!("pipeline #{i}: {} ({:?})", p.name(), p.task());
        }
        Self { pipelines, selector }
    }

    pub fn selector(&self) -> PipelineSelector {
        self.selector.clone()
    }

    pub fn set_pipeline(&self, index: usize) -> Result<()> {
        self.selector.select(index)
    }

    pub fn clear(&self) {
        self.selector.clear()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.selector.current()
    }

    /// `(name, task)` for every pipeline, in selection-index order.
    pub fn pipelines(&self) -> Vec<(&str, Task)> {
        self.pipelines.iter().map(|p| (p.name(), p.task())).collect()
    }

    /// Run the selected pipeline on `frame`.
    ///
    /// `flipped` records whether the preview is mirrored (front camera);
    /// it ends up in the result metadata, the prediction itself is never
    /// mirrored here.
    pub fn analyze(&mut self, frame: &YuvFrame, flipped: bool) -> Result<Option<AnalysisResult>> {
        let Some(pipeline) = self.current_index().and_then(|i| self.pipelines.get_mut(i)) else {
            return Ok(None);
        };

        let start = Instant::now();
        let prediction = pipeline.analyze(frame)?;
        let process_time = start.elapsed();
        debug!("frame #{} via {} in {process_time:?}", frame.sequence, pipeline.name());

        let (w, h) = (frame.crop.width().max(0) as u32, frame.crop.height().max(0) as u32);
        let metadata = ImageMetadata::new(w, h, flipped, frame.rotation_degrees);
        Ok(prediction.map(|prediction| AnalysisResult { prediction, process_time, metadata }))
    }
}
