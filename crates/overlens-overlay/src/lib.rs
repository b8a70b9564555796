// overlens-overlay/src/lib.rs
// ============================================================
// overlens-overlay  –  normalized results → preview pixels
// ------------------------------------------------------------
// Pipeline: AnalysisResult → PreviewBounds → Vec<Overlay> → RgbImage
// ------------------------------------------------------------
// Public API
//   * PreviewBounds::compute(content, view, mode, mirrored)
//   * map_box(box, content, view, mode, mirrored) – PixelRect
//   * OverlayMapper::map(result)                  – Vec<Overlay>
//   * DetectionSlot                               – latest result
//   * render_overlays / compose_preview           – raster output
// ============================================================

//! Overlens – overlay layer
//!
//! Everything here is pure arithmetic on the draw path except
//! [`DetectionSlot`], the one piece of state shared with the analysis
//! thread. A zero-sized view is a transient layout state: it maps to
//! empty geometry, never to an error.

mod bounds;
mod mapper;
mod render;
mod snapshot;

pub use bounds::{map_box, map_point, PixelPoint, PixelRect, PreviewBounds, ScaleMode};
pub use mapper::{Overlay, OverlayMapper};
pub use render::{compose_preview, render_overlays, OverlayStyle};
pub use snapshot::DetectionSlot;
