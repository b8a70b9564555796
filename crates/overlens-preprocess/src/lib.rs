//! overlens‑preprocess – YUV_420_888 → NV21 → RGB → normalized tensor.
//!
//! The plane converter in [`nv21`] is the byte-exact core; everything else
//! (RGB decode, rotation, resize, normalization) builds on its output.

use anyhow::{Context, Result as AnyResult};
use image::RgbImage;
use ndarray::{Array3, Array4};
use overlens_camera::{CropRect, YuvFrame};
use resize::{new, Pixel, Type};
use rgb::FromSlice;
use thiserror::Error;

pub mod color;
pub mod nv21;

pub use color::{nv21_to_jpeg, nv21_to_rgb, rotate};
pub use nv21::{frame_to_nv21, nv21_len, yuv420_to_nv21, yuv420_to_nv21_into, Nv21Buffer};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Expected 3 planes (Y, U, V), got {planes}")]
    InvalidFormat { planes: usize },
    #[error("Plane {plane} has unsupported strides (row {row_stride}, pixel {pixel_stride})")]
    UnsupportedStride { plane: usize, row_stride: i32, pixel_stride: i32 },
    #[error("Crop {crop:?} does not fit a {width}x{height} frame")]
    InvalidCrop { crop: CropRect, width: u32, height: u32 },
    #[error("Plane {plane} holds {len} bytes but the crop needs {needed}")]
    PlaneTooShort { plane: usize, needed: usize, len: usize },
    #[error("Output buffer holds {len} bytes but {needed} are required")]
    OutputTooSmall { needed: usize, len: usize },
    #[error("NV21 buffer length {len} does not match expected {expected}")]
    BufferLength { expected: usize, len: usize },
    #[error("Unsupported rotation: {0} degrees")]
    UnsupportedRotation(u32),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Memory order of the produced input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[1, H, W, 3]`
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`
    Nchw,
}

/// Per-channel `(value - mean) / std` applied to 0‑255 RGB samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Normalization {
    /// Maps 0‑255 to -1‥1.
    pub const fn symmetric() -> Self {
        Self { mean: [127.5; 3], std: [127.5; 3] }
    }

    /// Maps 0‑255 to 0‥1.
    pub const fn unit() -> Self {
        Self { mean: [0.0; 3], std: [255.0; 3] }
    }

    /// Leaves raw 0‑255 values untouched.
    pub const fn raw() -> Self {
        Self { mean: [0.0; 3], std: [1.0; 3] }
    }

    /// ImageNet statistics, as torchvision models expect.
    pub fn torch() -> Self {
        Self {
            mean: [0.485 * 255.0, 0.456 * 255.0, 0.406 * 255.0],
            std: [0.229 * 255.0, 0.224 * 255.0, 0.225 * 255.0],
        }
    }

    #[inline]
    fn apply(&self, channel: usize, value: u8) -> f32 {
        (value as f32 - self.mean[channel]) / self.std[channel]
    }
}

impl Default for Normalization {
    fn default() -> Self {
        Self::symmetric()
    }
}

#[derive(Clone)]
pub struct Preprocessor {
    dst_w: u32,
    dst_h: u32,
    normalization: Normalization,
    layout: TensorLayout,
}

impl Preprocessor {
    /// Create a pre‑processor that outputs WxH RGB tensors.
    pub fn new(dst_w: u32, dst_h: u32) -> Self {
        Self {
            dst_w,
            dst_h,
            normalization: Normalization::default(),
            layout: TensorLayout::default(),
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.dst_w, self.dst_h)
    }

    /// Frame → NV21 → upright RGB (crop and rotation applied).
    pub fn frame_to_rgb(&self, frame: &YuvFrame) -> AnyResult<RgbImage> {
        let nv21 = frame_to_nv21(frame)
            .with_context(|| format!("converting frame #{} to NV21", frame.sequence))?;
        let rgb = nv21_to_rgb(&nv21)?;
        Ok(rotate(rgb, frame.rotation_degrees)?)
    }

    /// Full path for a captured frame: returns a batch-of-one tensor.
    pub fn run(&self, frame: &YuvFrame) -> AnyResult<Array4<f32>> {
        let rgb = self.frame_to_rgb(frame)?;
        self.run_image(&rgb)
    }

    /// Resize + normalize an already decoded RGB image.
    pub fn run_image(&self, rgb: &RgbImage) -> AnyResult<Array4<f32>> {
        let dst = self.resize(rgb)?;
        let (w, h) = (self.dst_w as usize, self.dst_h as usize);
        let norm = self.normalization;

        let tensor = match self.layout {
            TensorLayout::Nhwc => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
                norm.apply(c, dst[(y * w + x) * 3 + c])
            }),
            TensorLayout::Nchw => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
                norm.apply(c, dst[(y * w + x) * 3 + c])
            }),
        };
        Ok(tensor)
    }

    /// HWC tensor in 0‑1, ignoring the configured normalization and layout.
    pub fn run_hwc(&self, frame: &YuvFrame) -> AnyResult<Array3<f32>> {
        let rgb = self.frame_to_rgb(frame)?;
        let dst = self.resize(&rgb)?;
        let shape = (self.dst_h as usize, self.dst_w as usize, 3);
        let values = dst.iter().map(|&px| px as f32 / 255.0).collect();
        Ok(Array3::from_shape_vec(shape, values)?)
    }

    /// Lanczos3 resize to the configured output size (resize crate).
    fn resize(&self, rgb: &RgbImage) -> AnyResult<Vec<u8>> {
        let (w, h) = (rgb.width() as usize, rgb.height() as usize);
        let mut dst = vec![0u8; (self.dst_w * self.dst_h * 3) as usize];

        let mut resizer = new(
            w,
            h,
            self.dst_w as usize,
            self.dst_h as usize,
            Pixel::RGB8,
            Type::Lanczos3,
        )
        .with_context(|| format!("building {w}x{h} → {}x{} resizer", self.dst_w, self.dst_h))?;

        resizer.resize(rgb.as_raw().as_rgb(), dst.as_rgb_mut())?;
        Ok(dst)
    }
}
