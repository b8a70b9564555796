// overlens-camera/src/lib.rs
// ============================================================
// Frame model + delivery layer for overlens
// Describes YUV_420_888 frames the way camera stacks hand them
// over: three planes, each with its own row and pixel stride,
// plus a crop rectangle and a rotation hint.
// ------------------------------------------------------------
// Public API:
//   * FrameSource::next_frame_blocking() – pull one frame
//   * SyntheticCamera                      – deterministic source
//   * LatestSlot / spawn_analyzer          – keep-only-latest hand-off
//   * frame_stream()                       – async latest-frame stream
// ============================================================

//! overlens – camera frame layer
//!
//! Frames are never assumed to be tightly packed. Every plane carries its
//! own `row_stride` and `pixel_stride`, exactly as reported by the platform,
//! and downstream converters must honour them. [`YuvFrame`] owns the plane
//! buffers; [`PlaneDescriptor`] is the borrowed, read-only view that lives
//! only for the duration of one conversion call.

use std::time::Duration;
use thiserror::Error;

mod latest;
mod stream;
mod synthetic;

pub use latest::{spawn_analyzer, LatestSlot};
pub use stream::frame_stream;
pub use synthetic::{ChromaLayout, SyntheticCamera};

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Crop {0:?} does not fit the frame")]
    InvalidCrop(CropRect),
    #[error("Unsupported rotation: {0} degrees")]
    UnsupportedRotation(u32),
    #[error("Frame source exhausted")]
    EndOfStream,
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// Crop rectangle in luma pixel coordinates, `right`/`bottom` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CropRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CropRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Crop covering a whole `width`×`height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// True when the rectangle is well ordered and lies inside `width`×`height`.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left >= 0
            && self.top >= 0
            && self.left <= self.right
            && self.top <= self.bottom
            && self.right as i64 <= width as i64
            && self.bottom as i64 <= height as i64
    }
}

/// Borrowed view of one image plane.
///
/// Strides are kept signed because that is how camera stacks report them;
/// validation happens in the converter, not here.
#[derive(Debug, Clone, Copy)]
pub struct PlaneDescriptor<'a> {
    pub data: &'a [u8],
    pub row_stride: i32,
    pub pixel_stride: i32,
}

/// Owned plane storage.
#[derive(Debug, Clone)]
pub struct Plane {
    pub data: Vec<u8>,
    pub row_stride: i32,
    pub pixel_stride: i32,
}

impl Plane {
    pub fn descriptor(&self) -> PlaneDescriptor<'_> {
        PlaneDescriptor {
            data: &self.data,
            row_stride: self.row_stride,
            pixel_stride: self.pixel_stride,
        }
    }
}

/// A captured YUV_420_888 frame: planes in Y, U, V order.
#[derive(Debug, Clone)]
pub struct YuvFrame {
    pub width: u32,
    pub height: u32,
    pub crop: CropRect,
    pub rotation_degrees: u32,
    pub sequence: u64,
    pub pts: Duration,
    pub planes: Vec<Plane>,
}

impl YuvFrame {
    /// Lend read-only plane views for a single conversion call.
    pub fn plane_descriptors(&self) -> Vec<PlaneDescriptor<'_>> {
        self.planes.iter().map(Plane::descriptor).collect()
    }

    /// Width and height after applying the crop and the rotation hint.
    pub fn upright_size(&self) -> (u32, u32) {
        let w = self.crop.width().max(0) as u32;
        let h = self.crop.height().max(0) as u32;
        match self.rotation_degrees {
            90 | 270 => (h, w),
            _ => (w, h),
        }
    }
}

/// Anything that can hand out frames one at a time.
pub trait FrameSource {
    /// Block until the next frame is available.
    ///
    /// Finite sources return [`CameraError::EndOfStream`] once exhausted.
    fn next_frame_blocking(&mut self) -> Result<YuvFrame>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_fits_within_bounds() {
        assert!(CropRect::full(640, 480).fits_within(640, 480));
        assert!(CropRect::new(2, 2, 10, 10).fits_within(10, 10));
        assert!(!CropRect::new(0, 0, 11, 10).fits_within(10, 10));
        assert!(!CropRect::new(5, 0, 4, 10).fits_within(10, 10));
        assert!(!CropRect::new(-1, 0, 4, 10).fits_within(10, 10));
    }

    #[test]
    fn upright_size_swaps_for_quarter_turns() {
        let frame = YuvFrame {
            width: 640,
            height: 480,
            crop: CropRect::full(640, 480),
            rotation_degrees: 90,
            sequence: 0,
            pts: Duration::ZERO,
            planes: Vec::new(),
        };
        assert_eq!(frame.upright_size(), (480, 640));
    }
}
