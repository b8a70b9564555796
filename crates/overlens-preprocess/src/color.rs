//! NV21 → RGB decode, JPEG encode and upright rotation.

use crate::{ConvertError, Nv21Buffer, Result};
use anyhow::Context;
use image::{codecs::jpeg::JpegEncoder, imageops, ExtendedColorType, Rgb, RgbImage};

/// Naive NV21 4:2:0 → RGB24 conversion (BT.601, full range).
pub fn nv21_to_rgb(nv21: &Nv21Buffer) -> Result<RgbImage> {
    let (w, h) = (nv21.width as usize, nv21.height as usize);
    let expected = crate::nv21_len(nv21.width, nv21.height);
    if nv21.len() != expected {
        return Err(ConvertError::BufferLength { expected, len: nv21.len() });
    }

    let (y_plane, vu_plane) = nv21.as_bytes().split_at(w * h);
    let vu_row = w.div_ceil(2) * 2;

    Ok(RgbImage::from_fn(nv21.width, nv21.height, |x, y| {
        let (i, j) = (x as usize, y as usize);
        let y_val = y_plane[j * w + i] as f32;
        let vu_idx = (j / 2) * vu_row + (i / 2) * 2;
        let v = vu_plane[vu_idx] as f32 - 128.0;
        let u = vu_plane[vu_idx + 1] as f32 - 128.0;

        let r = (y_val + 1.402 * v).clamp(0.0, 255.0);
        let g = (y_val - 0.344_13 * u - 0.714_14 * v).clamp(0.0, 255.0);
        let b = (y_val + 1.772 * u).clamp(0.0, 255.0);
        Rgb([r as u8, g as u8, b as u8])
    }))
}

/// Encode an NV21 image as a baseline JPEG at `quality` (1–100).
pub fn nv21_to_jpeg(nv21: &Nv21Buffer, quality: u8) -> anyhow::Result<Vec<u8>> {
    let rgb = nv21_to_rgb(nv21)?;
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .with_context(|| format!("encoding {}x{} JPEG", rgb.width(), rgb.height()))?;
    Ok(bytes)
}

/// Rotate clockwise by a multiple of 90 degrees.
pub fn rotate(image: RgbImage, degrees: u32) -> Result<RgbImage> {
    match degrees % 360 {
        0 => Ok(image),
        90 => Ok(imageops::rotate90(&image)),
        180 => Ok(imageops::rotate180(&image)),
        270 => Ok(imageops::rotate270(&image)),
        _ => Err(ConvertError::UnsupportedRotation(degrees)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(width: u32, height: u32, luma: u8) -> Nv21Buffer {
        let mut data = vec![128u8; crate::nv21_len(width, height)];
        data[..(width * height) as usize].fill(luma);
        Nv21Buffer { data, width, height }
    }

    #[test]
    fn neutral_chroma_decodes_to_gray() {
        let rgb = nv21_to_rgb(&gray(4, 2, 90)).unwrap();
        assert_eq!(rgb.dimensions(), (4, 2));
        assert!(rgb.pixels().all(|p| p.0 == [90, 90, 90]));
    }

    #[test]
    fn chroma_order_is_v_then_u() {
        // Strong V, neutral U → red dominates blue.
        let mut nv21 = gray(2, 2, 128);
        nv21.data[4] = 255; // V
        nv21.data[5] = 128; // U
        let px = nv21_to_rgb(&nv21).unwrap().get_pixel(0, 0).0;
        assert!(px[0] > 250);
        assert_eq!(px[2], 128);
    }

    #[test]
    fn odd_dimensions_decode() {
        let rgb = nv21_to_rgb(&gray(5, 3, 40)).unwrap();
        assert_eq!(rgb.dimensions(), (5, 3));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let bad = Nv21Buffer { data: vec![0; 5], width: 2, height: 2 };
        assert!(matches!(
            nv21_to_rgb(&bad),
            Err(ConvertError::BufferLength { expected: 6, len: 5 })
        ));
    }

    #[test]
    fn jpeg_round_trips_dimensions() {
        let jpeg = nv21_to_jpeg(&gray(16, 8, 200), 90).unwrap();
        let decoded = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let img = RgbImage::new(4, 2);
        assert_eq!(rotate(img.clone(), 90).unwrap().dimensions(), (2, 4));
        assert_eq!(rotate(img.clone(), 180).unwrap().dimensions(), (4, 2));
        assert_eq!(rotate(img.clone(), 270).unwrap().dimensions(), (2, 4));
        assert!(matches!(rotate(img, 45), Err(ConvertError::UnsupportedRotation(45))));
    }
}
