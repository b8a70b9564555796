//! YUV_420_888 → NV21 plane conversion.
//!
//! The output is one contiguous buffer: every luma sample of the crop in
//! row-major order, followed by chroma pairs ordered V, U, V, U, …
//!
//! ```text
//! Y plane            chroma block (starts at pixel_count)
//! ===============    ===============
//! Y Y Y Y Y Y Y Y    V U V U V U V U
//! Y Y Y Y Y Y Y Y    V U V U V U V U
//! Y Y Y Y Y Y Y Y
//! Y Y Y Y Y Y Y Y
//! ```
//!
//! Input planes may be padded (`row_stride` > width) and chroma may be
//! interleaved (`pixel_stride` 2); nothing about the input is assumed packed.

use crate::{ConvertError, Result};
use overlens_camera::{CropRect, PlaneDescriptor, YuvFrame};

/// An NV21 image: luma block then interleaved V/U block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nv21Buffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Nv21Buffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of luma samples, i.e. where the chroma block begins.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Exact NV21 length for a `width`×`height` image.
pub fn nv21_len(width: u32, height: u32) -> usize {
    let (w, h) = (width as usize, height as usize);
    w * h + 2 * w.div_ceil(2) * h.div_ceil(2)
}

/// Where one input plane is read from and how it lands in the output.
#[derive(Debug, Clone, Copy)]
struct PlaneJob {
    left: usize,
    top: usize,
    width: usize,
    height: usize,
    out_offset: usize,
    out_stride: usize,
}

fn plane_jobs(crop: CropRect) -> [PlaneJob; 3] {
    let (left, top) = (crop.left as usize, crop.top as usize);
    let (width, height) = (crop.width() as usize, crop.height() as usize);
    let pixel_count = width * height;

    let luma = PlaneJob { left, top, width, height, out_offset: 0, out_stride: 1 };
    // Chroma origin is the halved luma origin; its extent is the halved
    // luma extent rounded up, so odd crops still get a full chroma block.
    let chroma = PlaneJob {
        left: left / 2,
        top: top / 2,
        width: width.div_ceil(2),
        height: height.div_ceil(2),
        out_offset: 0,
        out_stride: 2,
    };

    [
        luma,
        // U lands on odd indices of the chroma block, V on even ones.
        PlaneJob { out_offset: pixel_count + 1, ..chroma },
        PlaneJob { out_offset: pixel_count, ..chroma },
    ]
}

fn resolve_crop(width: u32, height: u32, crop: Option<CropRect>) -> Result<CropRect> {
    let crop = crop.unwrap_or_else(|| CropRect::full(width, height));
    if !crop.fits_within(width, height) {
        return Err(ConvertError::InvalidCrop { crop, width, height });
    }
    Ok(crop)
}

fn validate_planes(planes: &[PlaneDescriptor<'_>], jobs: &[PlaneJob; 3]) -> Result<()> {
    if planes.len() < 3 {
        return Err(ConvertError::InvalidFormat { planes: planes.len() });
    }
    if planes.len() > 3 {
        log::warn!("ignoring {} extra plane(s) beyond Y/U/V", planes.len() - 3);
    }

    for (index, (plane, job)) in planes.iter().zip(jobs).enumerate() {
        if plane.row_stride <= 0 || plane.pixel_stride <= 0 {
            return Err(ConvertError::UnsupportedStride {
                plane: index,
                row_stride: plane.row_stride,
                pixel_stride: plane.pixel_stride,
            });
        }
        if job.width == 0 || job.height == 0 {
            continue;
        }
        let (row_stride, pixel_stride) = (plane.row_stride as usize, plane.pixel_stride as usize);
        let last = (job.top + job.height - 1) * row_stride
            + (job.left + job.width - 1) * pixel_stride;
        if last >= plane.data.len() {
            return Err(ConvertError::PlaneTooShort {
                plane: index,
                needed: last + 1,
                len: plane.data.len(),
            });
        }
    }
    Ok(())
}

fn copy_plane(plane: &PlaneDescriptor<'_>, job: &PlaneJob, out: &mut [u8]) {
    if job.width == 0 || job.height == 0 {
        return;
    }
    let row_stride = plane.row_stride as usize;
    let pixel_stride = plane.pixel_stride as usize;
    let mut offset = job.out_offset;

    for row in 0..job.height {
        let start = (row + job.top) * row_stride + job.left * pixel_stride;
        if pixel_stride == 1 && job.out_stride == 1 {
            // Contiguous on both sides: one copy per row.
            out[offset..offset + job.width].copy_from_slice(&plane.data[start..start + job.width]);
            offset += job.width;
        } else {
            let samples = plane.data[start..].iter().step_by(pixel_stride).take(job.width);
            for (dst, &src) in out[offset..].iter_mut().step_by(job.out_stride).zip(samples) {
                *dst = src;
            }
            offset += job.width * job.out_stride;
        }
    }
}

/// Convert Y/U/V planes of a `width`×`height` frame into `out`.
///
/// `crop` is in luma coordinates; `None` means the whole frame. Returns the
/// number of bytes written, which is always [`nv21_len`] of the crop size.
pub fn yuv420_to_nv21_into(
    planes: &[PlaneDescriptor<'_>],
    width: u32,
    height: u32,
    crop: Option<CropRect>,
    out: &mut [u8],
) -> Result<usize> {
    let crop = resolve_crop(width, height, crop)?;
    let jobs = plane_jobs(crop);
    validate_planes(planes, &jobs)?;

    let needed = nv21_len(crop.width() as u32, crop.height() as u32);
    if out.len() < needed {
        return Err(ConvertError::OutputTooSmall { needed, len: out.len() });
    }

    for (plane, job) in planes.iter().zip(&jobs) {
        copy_plane(plane, job, &mut out[..needed]);
    }
    Ok(needed)
}

/// Allocating variant of [`yuv420_to_nv21_into`].
pub fn yuv420_to_nv21(
    planes: &[PlaneDescriptor<'_>],
    width: u32,
    height: u32,
    crop: Option<CropRect>,
) -> Result<Nv21Buffer> {
    let resolved = resolve_crop(width, height, crop)?;
    let (out_w, out_h) = (resolved.width() as u32, resolved.height() as u32);
    let mut data = vec![0u8; nv21_len(out_w, out_h)];
    yuv420_to_nv21_into(planes, width, height, Some(resolved), &mut data)?;
    Ok(Nv21Buffer { data, width: out_w, height: out_h })
}

/// Convert a captured frame, honouring its crop rectangle.
pub fn frame_to_nv21(frame: &YuvFrame) -> Result<Nv21Buffer> {
    yuv420_to_nv21(&frame.plane_descriptors(), frame.width, frame.height, Some(frame.crop))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(data: &[u8], row_stride: i32, pixel_stride: i32) -> PlaneDescriptor<'_> {
        PlaneDescriptor { data, row_stride, pixel_stride }
    }

    #[test]
    fn ramp_4x4_matches_hand_computed_layout() {
        let y: Vec<u8> = (0..16).collect();
        let u: [u8; 4] = [100, 101, 102, 103];
        let v: [u8; 4] = [200, 201, 202, 203];
        let planes = [plane(&y, 4, 1), plane(&u, 2, 1), plane(&v, 2, 1)];

        let out = yuv420_to_nv21(&planes, 4, 4, None).unwrap();

        let mut expected: Vec<u8> = (0..16).collect();
        expected.extend_from_slice(&[200, 100, 201, 101, 202, 102, 203, 103]);
        assert_eq!(out.data, expected);
        assert_eq!((out.width, out.height), (4, 4));
    }

    #[test]
    fn packed_inputs_produce_invariant_length() {
        for (w, h) in [(2u32, 2u32), (4, 4), (5, 3), (7, 7), (16, 9), (1, 1)] {
            let (cw, ch) = (w.div_ceil(2) as usize, h.div_ceil(2) as usize);
            let y = vec![16u8; (w * h) as usize];
            let u = vec![128u8; cw * ch];
            let v = vec![128u8; cw * ch];
            let planes = [
                plane(&y, w as i32, 1),
                plane(&u, cw as i32, 1),
                plane(&v, cw as i32, 1),
            ];
            let out = yuv420_to_nv21(&planes, w, h, None).unwrap();
            assert_eq!(out.len(), (w * h) as usize + 2 * cw * ch, "{w}x{h}");
            assert_eq!(out.len(), nv21_len(w, h));
        }
    }

    #[test]
    fn full_crop_equals_no_crop() {
        let y: Vec<u8> = (0..64).collect();
        let u: Vec<u8> = (100..116).collect();
        let v: Vec<u8> = (200..216).collect();
        let planes = [plane(&y, 8, 1), plane(&u, 4, 1), plane(&v, 4, 1)];

        let whole = yuv420_to_nv21(&planes, 8, 8, None).unwrap();
        let cropped = yuv420_to_nv21(&planes, 8, 8, Some(CropRect::full(8, 8))).unwrap();
        assert_eq!(whole, cropped);
    }

    #[test]
    fn crop_selects_sub_rectangle_and_halves_for_chroma() {
        let y: Vec<u8> = (0..64).collect();
        let u: Vec<u8> = (100..116).collect();
        let v: Vec<u8> = (200..216).collect();
        let planes = [plane(&y, 8, 1), plane(&u, 4, 1), plane(&v, 4, 1)];

        let out = yuv420_to_nv21(&planes, 8, 8, Some(CropRect::new(2, 2, 6, 6))).unwrap();

        let mut expected: Vec<u8> = vec![18, 19, 20, 21, 26, 27, 28, 29, 34, 35, 36, 37, 42, 43, 44, 45];
        // chroma crop (1,1)-(3,3): rows 1 and 2, cols 1 and 2 of the 4x4 planes
        expected.extend_from_slice(&[205, 105, 206, 106, 209, 109, 210, 110]);
        assert_eq!(out.data, expected);
    }

    #[test]
    fn padded_semi_planar_matches_packed_planar() {
        // 4x2 image, luma rows padded to 6, chroma as interleaved V/U views.
        let y: [u8; 12] = [1, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0];
        let vu: [u8; 6] = [50, 60, 51, 61, 0, 0];
        let planes = [plane(&y, 6, 1), plane(&vu[1..4], 6, 2), plane(&vu[..3], 6, 2)];

        let out = yuv420_to_nv21(&planes, 4, 2, None).unwrap();
        assert_eq!(out.data, vec![1, 2, 3, 4, 5, 6, 7, 8, 50, 60, 51, 61]);
    }

    #[test]
    fn fewer_than_three_planes_is_invalid_format() {
        let y = [0u8; 4];
        let err = yuv420_to_nv21(&[plane(&y, 2, 1)], 2, 2, None).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidFormat { planes: 1 }));
    }

    #[test]
    fn non_positive_stride_is_rejected() {
        let y = [0u8; 4];
        let c = [0u8; 1];
        let planes = [plane(&y, 2, 1), plane(&c, 0, 1), plane(&c, 1, 1)];
        let err = yuv420_to_nv21(&planes, 2, 2, None).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnsupportedStride { plane: 1, row_stride: 0, pixel_stride: 1 }
        ));

        let planes = [plane(&y, 2, -1), plane(&c, 1, 1), plane(&c, 1, 1)];
        let err = yuv420_to_nv21(&planes, 2, 2, None).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedStride { plane: 0, .. }));
    }

    #[test]
    fn extra_planes_are_ignored() {
        let y = [9u8; 4];
        let u = [1u8];
        let v = [2u8];
        let junk = [0u8; 2];
        let planes = [plane(&y, 2, 1), plane(&u, 1, 1), plane(&v, 1, 1), plane(&junk, -5, 0)];
        let out = yuv420_to_nv21(&planes, 2, 2, None).unwrap();
        assert_eq!(out.data, vec![9, 9, 9, 9, 2, 1]);
    }

    #[test]
    fn short_plane_is_reported_not_panicked() {
        let y = [0u8; 3];
        let c = [0u8; 1];
        let planes = [plane(&y, 2, 1), plane(&c, 1, 1), plane(&c, 1, 1)];
        let err = yuv420_to_nv21(&planes, 2, 2, None).unwrap_err();
        assert!(matches!(err, ConvertError::PlaneTooShort { plane: 0, needed: 4, len: 3 }));
    }

    #[test]
    fn crop_outside_frame_is_rejected() {
        let y = [0u8; 4];
        let c = [0u8; 1];
        let planes = [plane(&y, 2, 1), plane(&c, 1, 1), plane(&c, 1, 1)];
        let err = yuv420_to_nv21(&planes, 2, 2, Some(CropRect::new(0, 0, 3, 2))).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidCrop { .. }));
    }

    #[test]
    fn into_rejects_short_output() {
        let y = [0u8; 4];
        let c = [0u8; 1];
        let planes = [plane(&y, 2, 1), plane(&c, 1, 1), plane(&c, 1, 1)];
        let mut out = [0u8; 5];
        let err = yuv420_to_nv21_into(&planes, 2, 2, None, &mut out).unwrap_err();
        assert!(matches!(err, ConvertError::OutputTooSmall { needed: 6, len: 5 }));
    }

    #[test]
    fn empty_crop_yields_empty_buffer() {
        let y = [0u8; 4];
        let c = [0u8; 1];
        let planes = [plane(&y, 2, 1), plane(&c, 1, 1), plane(&c, 1, 1)];
        let out = yuv420_to_nv21(&planes, 2, 2, Some(CropRect::new(1, 1, 1, 1))).unwrap();
        assert!(out.is_empty());
    }
}
