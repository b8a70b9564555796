//! Normalized → view pixel mapping for fill-center / fit-center previews.

use overlens_detect::{NormalizedBox, NormalizedPoint};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How content is scaled into the view, aspect ratio always preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Cover the whole view, cropping the overflow.
    #[default]
    FillCenter,
    /// Show all content, letterboxing the rest.
    FitCenter,
}

impl FromStr for ScaleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fill" | "fill_center" | "fill-center" => Ok(ScaleMode::FillCenter),
            "fit" | "fit_center" | "fit-center" => Ok(ScaleMode::FitCenter),
            other => Err(format!("unknown scale mode '{other}' (expected fill or fit)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f32,
    pub y: f32,
}

/// View-space rectangle. Always `left <= right` and `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl PixelRect {
    pub const EMPTY: PixelRect = PixelRect { left: 0.0, top: 0.0, right: 0.0, bottom: 0.0 };

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// Placement of the scaled content inside the view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewBounds {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scaled_width: f32,
    pub scaled_height: f32,
    pub view_width: f32,
    pub view_height: f32,
    pub mirrored: bool,
}

impl PreviewBounds {
    /// `None` when either the content or the view has a zero dimension.
    pub fn compute(
        content_width: u32,
        content_height: u32,
        view_width: u32,
        view_height: u32,
        mode: ScaleMode,
        mirrored: bool,
    ) -> Option<Self> {
        if content_width == 0 || content_height == 0 || view_width == 0 || view_height == 0 {
            return None;
        }
        let (cw, ch) = (content_width as f32, content_height as f32);
        let (vw, vh) = (view_width as f32, view_height as f32);

        let (sx, sy) = (vw / cw, vh / ch);
        let scale = match mode {
            ScaleMode::FillCenter => sx.max(sy),
            ScaleMode::FitCenter => sx.min(sy),
        };
        let (scaled_width, scaled_height) = (cw * scale, ch * scale);

        Some(Self {
            offset_x: vw / 2.0 - scaled_width / 2.0,
            offset_y: vh / 2.0 - scaled_height / 2.0,
            scaled_width,
            scaled_height,
            view_width: vw,
            view_height: vh,
            mirrored,
        })
    }

    /// Uniform content → view scale factor.
    pub fn scale(&self, content_width: u32) -> f32 {
        self.scaled_width / content_width.max(1) as f32
    }

    fn x(&self, nx: f32) -> f32 {
        let x = nx * self.scaled_width + self.offset_x;
        if self.mirrored {
            self.view_width - x
        } else {
            x
        }
    }

    fn y(&self, ny: f32) -> f32 {
        ny * self.scaled_height + self.offset_y
    }

    pub fn map_point(&self, p: NormalizedPoint) -> PixelPoint {
        PixelPoint {
            x: self.x(p.x).clamp(0.0, self.view_width),
            y: self.y(p.y).clamp(0.0, self.view_height),
        }
    }

    pub fn map_box(&self, b: &NormalizedBox) -> PixelRect {
        let (x0, x1) = (self.x(b.left), self.x(b.right));
        let (y0, y1) = (self.y(b.top), self.y(b.bottom));
        PixelRect {
            left: x0.min(x1).clamp(0.0, self.view_width),
            top: y0.min(y1).clamp(0.0, self.view_height),
            right: x0.max(x1).clamp(0.0, self.view_width),
            bottom: y0.max(y1).clamp(0.0, self.view_height),
        }
    }
}

/// One-shot box mapping; a zero-sized content or view gives [`PixelRect::EMPTY`].
pub fn map_box(
    b: &NormalizedBox,
    content: (u32, u32),
    view: (u32, u32),
    mode: ScaleMode,
    mirrored: bool,
) -> PixelRect {
    PreviewBounds::compute(content.0, content.1, view.0, view.1, mode, mirrored)
        .map_or(PixelRect::EMPTY, |bounds| bounds.map_box(b))
}

pub fn map_point(
    p: NormalizedPoint,
    content: (u32, u32),
    view: (u32, u32),
    mode: ScaleMode,
    mirrored: bool,
) -> Option<PixelPoint> {
    PreviewBounds::compute(content.0, content.1, view.0, view.1, mode, mirrored)
        .map(|bounds| bounds.map_point(p))
}
