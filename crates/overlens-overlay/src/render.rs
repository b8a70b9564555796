//! Raster output: frame placement and overlay drawing (imageproc).

use crate::{Overlay, PixelRect, PreviewBounds};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use log::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    pub box_color: Rgb<u8>,
    pub skeleton_color: Rgb<u8>,
    pub landmark_color: Rgb<u8>,
    pub background: Rgb<u8>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: Rgb([255, 0, 0]),
            skeleton_color: Rgb([0, 255, 255]),
            landmark_color: Rgb([255, 255, 0]),
            background: Rgb([0, 0, 0]),
        }
    }
}

/// Place `frame` into a `view_width × view_height` canvas as `bounds` says,
/// mirrored when the bounds are.
pub fn compose_preview(frame: &RgbImage, bounds: &PreviewBounds, style: &OverlayStyle) -> RgbImage {
    let (vw, vh) = (bounds.view_width as u32, bounds.view_height as u32);
    let mut canvas = RgbImage::from_pixel(vw, vh, style.background);

    let sw = (bounds.scaled_width.round() as u32).max(1);
    let sh = (bounds.scaled_height.round() as u32).max(1);
    let mut scaled = imageops::resize(frame, sw, sh, imageops::FilterType::Triangle);

    let x = if bounds.mirrored {
        imageops::flip_horizontal_in_place(&mut scaled);
        bounds.view_width - bounds.offset_x - bounds.scaled_width
    } else {
        bounds.offset_x
    };
    imageops::overlay(&mut canvas, &scaled, x.round() as i64, bounds.offset_y.round() as i64);
    canvas
}

/// Draw every overlay onto `canvas`; returns how many primitives were drawn.
pub fn render_overlays(canvas: &mut RgbImage, overlays: &[Overlay], style: &OverlayStyle) -> usize {
    let mut drawn = 0;
    for overlay in overlays {
        match overlay {
            Overlay::Rect { rect, stroke, label } => {
                if draw_thick_rect(canvas, rect, *stroke, style.box_color) {
                    trace!("box {label} at {rect:?}");
                    drawn += 1;
                }
            }
            Overlay::Line { from, to, stroke } => {
                let t = thickness(*stroke);
                for i in 0..t {
                    let d = i as f32 - (t - 1) as f32 / 2.0;
                    draw_line_segment_mut(
                        canvas,
                        (from.x + d, from.y),
                        (to.x + d, to.y),
                        style.skeleton_color,
                    );
                }
                drawn += 1;
            }
            Overlay::Dot { at, radius } => {
                let r = radius.round().max(1.0) as i32;
                draw_filled_circle_mut(canvas, (at.x as i32, at.y as i32), r, style.landmark_color);
                drawn += 1;
            }
            // No font is bundled; captions are reported by the caller.
            Overlay::Caption { .. } => {}
        }
    }
    drawn
}

fn thickness(stroke: f32) -> u32 {
    stroke.round().max(1.0) as u32
}

fn draw_thick_rect(canvas: &mut RgbImage, rect: &PixelRect, stroke: f32, color: Rgb<u8>) -> bool {
    let (x, y) = (rect.left.round() as i32, rect.top.round() as i32);
    let (w, h) = (rect.width().round() as i32, rect.height().round() as i32);
    if w <= 0 || h <= 0 {
        return false;
    }
    for i in 0..thickness(stroke) as i32 {
        let (iw, ih) = (w - 2 * i, h - 2 * i);
        if iw <= 0 || ih <= 0 {
            break;
        }
        draw_hollow_rect_mut(canvas, Rect::at(x + i, y + i).of_size(iw as u32, ih as u32), color);
    }
    true
}
