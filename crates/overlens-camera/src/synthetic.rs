//! Deterministic YUV_420_888 frame generator.
//!
//! Produces a horizontal luma ramp with a bright square that slides across
//! the frame, plus tinted chroma under the square. Layout knobs mimic what
//! real devices report: padded rows, and semi-planar chroma where the U and
//! V planes are two views over one interleaved buffer (pixel stride 2).

use crate::{CameraError, CropRect, FrameSource, Plane, Result, YuvFrame};
use std::time::{Duration, Instant};

const MARKER_LUMA: u8 = 235;
const MARKER_U: u8 = 90;
const MARKER_V: u8 = 200;
const NEUTRAL_CHROMA: u8 = 128;
const MARKER_STEP: u32 = 8;

/// How chroma samples are laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChromaLayout {
    /// Separate U and V planes, pixel stride 1.
    Planar,
    /// Interleaved V/U buffer exposed as two planes with pixel stride 2.
    #[default]
    SemiPlanar,
}

#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    fps: u32,
    layout: ChromaLayout,
    row_padding: u32,
    rotation_degrees: u32,
    crop: Option<CropRect>,
    frame_limit: Option<u64>,
    sequence: u64,
    last_emit: Option<Instant>,
}

impl SyntheticCamera {
    /// Build a source of `width`×`height` frames paced at `fps` (0 = unpaced).
    pub fn new(width: u32, height: u32, fps: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CameraError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            fps,
            layout: ChromaLayout::default(),
            row_padding: 0,
            rotation_degrees: 0,
            crop: None,
            frame_limit: None,
            sequence: 0,
            last_emit: None,
        })
    }

    pub fn with_layout(mut self, layout: ChromaLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Extra bytes appended to every luma row (half of it to chroma rows).
    pub fn with_row_padding(mut self, padding: u32) -> Self {
        self.row_padding = padding;
        self
    }

    pub fn with_rotation(mut self, degrees: u32) -> Result<Self> {
        if !matches!(degrees, 0 | 90 | 180 | 270) {
            return Err(CameraError::UnsupportedRotation(degrees));
        }
        self.rotation_degrees = degrees;
        Ok(self)
    }

    pub fn with_crop(mut self, crop: CropRect) -> Result<Self> {
        if !crop.fits_within(self.width, self.height) {
            return Err(CameraError::InvalidCrop(crop));
        }
        self.crop = Some(crop);
        Ok(self)
    }

    /// Stop with [`CameraError::EndOfStream`] after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Side length of the bright marker square, in luma pixels.
    pub fn marker_side(&self) -> u32 {
        (self.width.min(self.height) / 4).max(1)
    }

    /// Pixel rectangle the marker occupies in frame `sequence`.
    pub fn marker_rect(&self, sequence: u64) -> CropRect {
        let side = self.marker_side();
        let travel = (self.width - side).max(1) as u64;
        let left = ((sequence * MARKER_STEP as u64) % travel) as u32;
        let top = (self.height - side) / 2;
        CropRect::new(left as i32, top as i32, (left + side) as i32, (top + side) as i32)
    }

    fn pace(&mut self) {
        if self.fps == 0 {
            return;
        }
        let period = Duration::from_secs_f64(1.0 / self.fps as f64);
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
        self.last_emit = Some(Instant::now());
    }

    fn render(&self, sequence: u64) -> YuvFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let marker = self.marker_rect(sequence);
        let in_marker = |x: usize, y: usize| {
            (x as i32) >= marker.left
                && (x as i32) < marker.right
                && (y as i32) >= marker.top
                && (y as i32) < marker.bottom
        };

        let y_stride = w + self.row_padding as usize;
        let mut luma = vec![0u8; y_stride * h];
        for y in 0..h {
            for x in 0..w {
                luma[y * y_stride + x] = if in_marker(x, y) {
                    MARKER_LUMA
                } else {
                    ((x * 200) / w.max(1)) as u8 + 16
                };
            }
        }

        let chroma_at = |cx: usize, cy: usize| {
            if in_marker(cx * 2, cy * 2) {
                (MARKER_U, MARKER_V)
            } else {
                (NEUTRAL_CHROMA, NEUTRAL_CHROMA)
            }
        };

        let chroma_padding = (self.row_padding / 2) as usize;
        let (u_plane, v_plane) = match self.layout {
            ChromaLayout::Planar => {
                let stride = cw + chroma_padding;
                let mut u = vec![0u8; stride * ch];
                let mut v = vec![0u8; stride * ch];
                for cy in 0..ch {
                    for cx in 0..cw {
                        let (us, vs) = chroma_at(cx, cy);
                        u[cy * stride + cx] = us;
                        v[cy * stride + cx] = vs;
                    }
                }
                (
                    Plane { data: u, row_stride: stride as i32, pixel_stride: 1 },
                    Plane { data: v, row_stride: stride as i32, pixel_stride: 1 },
                )
            }
            ChromaLayout::SemiPlanar => {
                // One V,U,V,U... buffer; the U view starts one byte in and
                // both views stop at their own last sample.
                let stride = cw * 2 + chroma_padding;
                let mut vu = vec![0u8; stride * ch];
                for cy in 0..ch {
                    for cx in 0..cw {
                        let (us, vs) = chroma_at(cx, cy);
                        vu[cy * stride + cx * 2] = vs;
                        vu[cy * stride + cx * 2 + 1] = us;
                    }
                }
                let view_len = stride * (ch - 1) + cw * 2 - 1;
                (
                    Plane { data: vu[1..1 + view_len].to_vec(), row_stride: stride as i32, pixel_stride: 2 },
                    Plane { data: vu[..view_len].to_vec(), row_stride: stride as i32, pixel_stride: 2 },
                )
            }
        };

        let pts = if self.fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(sequence as f64 / self.fps as f64)
        };

        YuvFrame {
            width: self.width,
            height: self.height,
            crop: self.crop.unwrap_or_else(|| CropRect::full(self.width, self.height)),
            rotation_degrees: self.rotation_degrees,
            sequence,
            pts,
            planes: vec![
                Plane { data: luma, row_stride: y_stride as i32, pixel_stride: 1 },
                u_plane,
                v_plane,
            ],
        }
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame_blocking(&mut self) -> Result<YuvFrame> {
        if self.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::EndOfStream);
        }
        self.pace();
        let frame = self.render(self.sequence);
        self.sequence += 1;
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_dimensions() {
        assert!(matches!(
            SyntheticCamera::new(0, 480, 30),
            Err(CameraError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn semi_planar_views_share_interleaved_layout() {
        let mut cam = SyntheticCamera::new(8, 4, 0).unwrap().with_row_padding(4);
        let frame = cam.next_frame_blocking().unwrap();
        assert_eq!(frame.planes.len(), 3);
        assert_eq!(frame.planes[0].row_stride, 12);
        let (u, v) = (&frame.planes[1], &frame.planes[2]);
        assert_eq!(u.pixel_stride, 2);
        assert_eq!(v.pixel_stride, 2);
        // U view is the V view shifted by one byte.
        assert_eq!(&u.data[..u.data.len() - 1], &v.data[1..]);
    }

    #[test]
    fn planar_layout_uses_unit_pixel_stride() {
        let mut cam = SyntheticCamera::new(6, 6, 0)
            .unwrap()
            .with_layout(ChromaLayout::Planar);
        let frame = cam.next_frame_blocking().unwrap();
        assert_eq!(frame.planes[1].pixel_stride, 1);
        assert_eq!(frame.planes[1].row_stride, 3);
        assert_eq!(frame.planes[1].data.len(), 9);
    }

    #[test]
    fn frame_limit_ends_the_source() {
        let mut cam = SyntheticCamera::new(4, 4, 0).unwrap().with_frame_limit(2);
        assert_eq!(cam.next_frame_blocking().unwrap().sequence, 0);
        assert_eq!(cam.next_frame_blocking().unwrap().sequence, 1);
        assert!(matches!(cam.next_frame_blocking(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn marker_moves_between_frames() {
        let cam = SyntheticCamera::new(64, 32, 0).unwrap();
        let a = cam.marker_rect(0);
        let b = cam.marker_rect(1);
        assert_eq!(a.width(), 8);
        assert_eq!(b.left - a.left, MARKER_STEP as i32);
        assert_eq!(a.top, b.top);
    }

    #[test]
    fn rotation_must_be_a_quarter_turn() {
        let cam = SyntheticCamera::new(4, 4, 0).unwrap();
        assert!(matches!(cam.with_rotation(45), Err(CameraError::UnsupportedRotation(45))));
    }
}
