//! JSON run configuration. Every field has a default, so a config file
//! only needs the values it changes.

use overlens_camera::{CameraError, ChromaLayout, CropRect, SyntheticCamera};
use overlens_overlay::{OverlayMapper, ScaleMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSetting {
    Planar,
    #[default]
    SemiPlanar,
}

impl From<LayoutSetting> for ChromaLayout {
    fn from(l: LayoutSetting) -> Self {
        match l {
            LayoutSetting::Planar => ChromaLayout::Planar,
            LayoutSetting::SemiPlanar => ChromaLayout::SemiPlanar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,
    /// 0 renders as fast as possible.
    pub fps: u32,
    pub layout: LayoutSetting,
    pub row_padding: u32,
    pub rotation_degrees: u32,
    /// `[left, top, right, bottom]` in sensor pixels.
    pub crop: Option<[i32; 4]>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            layout: LayoutSetting::default(),
            row_padding: 0,
            rotation_degrees: 0,
            crop: None,
        }
    }
}

impl CameraConfig {
    pub fn build(&self, frames: u64) -> Result<SyntheticCamera, CameraError> {
        let mut cam = SyntheticCamera::new(self.width, self.height, self.fps)?
            .with_layout(self.layout.into())
            .with_row_padding(self.row_padding)
            .with_rotation(self.rotation_degrees)?;
        if frames > 0 {
            cam = cam.with_frame_limit(frames);
        }
        if let Some([l, t, r, b]) = self.crop {
            cam = cam.with_crop(CropRect::new(l, t, r, b))?;
        }
        Ok(cam)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub view_width: u32,
    pub view_height: u32,
    pub scale_mode: ScaleMode,
    pub mirrored: bool,
    pub stroke_width: f32,
    pub landmark_radius: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            view_width: 480,
            view_height: 640,
            scale_mode: ScaleMode::FillCenter,
            mirrored: false,
            stroke_width: 6.0,
            landmark_radius: 3.0,
        }
    }
}

impl OverlayConfig {
    pub fn mapper(&self) -> OverlayMapper {
        OverlayMapper {
            stroke_width: self.stroke_width,
            landmark_radius: self.landmark_radius,
            ..OverlayMapper::new(self.view_width, self.view_height, self.scale_mode)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Frames to capture; 0 keeps going until Ctrl-C.
    pub frames: u64,
    pub camera: CameraConfig,
    pub overlay: OverlayConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { frames: 30, camera: CameraConfig::default(), overlay: OverlayConfig::default() }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"frames": 5, "overlay": {{"scale_mode": "fit_center", "mirrored": true}}}}"#)
            .unwrap();

        let cfg = ClientConfig::load(file.path()).unwrap();
        assert_eq!(cfg.frames, 5);
        assert_eq!(cfg.overlay.scale_mode, ScaleMode::FitCenter);
        assert!(cfg.overlay.mirrored);
        assert_eq!(cfg.overlay.view_width, 480);
        assert_eq!(cfg.camera, CameraConfig::default());
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ frames: ").unwrap();
        let err = ClientConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[test]
    fn missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ClientConfig::load(&dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn camera_config_validates_rotation_and_crop() {
        let mut cam = CameraConfig { rotation_degrees: 45, ..CameraConfig::default() };
        assert!(matches!(cam.build(1), Err(CameraError::UnsupportedRotation(45))));

        cam.rotation_degrees = 90;
        cam.crop = Some([0, 0, 700, 480]);
        assert!(matches!(cam.build(1), Err(CameraError::InvalidCrop(_))));

        cam.crop = Some([0, 0, 320, 240]);
        assert!(cam.build(1).is_ok());
    }

    #[test]
    fn mapper_carries_stroke_settings() {
        let overlay = OverlayConfig { stroke_width: 2.0, ..OverlayConfig::default() };
        let m = overlay.mapper();
        assert_eq!((m.view_width, m.view_height, m.stroke_width), (480, 640, 2.0));
    }
}
