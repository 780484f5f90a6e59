use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::frame::Frame;

/// Capture quality preset, mapped to a fixed BGRA8 resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapturePreset {
    Low,
    #[default]
    Medium,
    High,
}

impl CapturePreset {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Low => (640, 480),
            Self::Medium => (1280, 720),
            Self::High => (1920, 1080),
        }
    }
}

/// Capture configuration handed to the driver before `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub preset: CapturePreset,
    /// Frames per second; 30 or 60.
    pub frame_rate: u32,
    pub device_id: String,
    pub mirrored: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            preset: CapturePreset::Medium,
            frame_rate: 30,
            device_id: String::new(),
            mirrored: false,
        }
    }
}

impl CaptureConfig {
    /// Reject combinations outside the supported format table.
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate != 30 && self.frame_rate != 60 {
            return Err(PipelineError::Config(format!(
                "unsupported frame rate {}",
                self.frame_rate
            )));
        }
        if self.preset == CapturePreset::Low && self.frame_rate == 60 {
            return Err(PipelineError::Config(
                "640x480 supports 30 fps only".to_string(),
            ));
        }
        Ok(())
    }
}

/// Callbacks invoked on the driver's delivery thread.
///
/// `on_frame` borrows the pixel data for the duration of the call; the
/// receiver copies anything it wants to keep.
pub struct CaptureCallbacks {
    pub on_frame: Box<dyn Fn(Frame<'_>) + Send>,
    pub on_error: Box<dyn Fn(&str) + Send>,
}

/// Platform capture-driver seam (AVFoundation, V4L2, DirectShow…).
///
/// Implementations deliver timestamped BGRA8 frames on their own thread
/// until `stop`. `stop` is idempotent; `set_device` may be called while
/// running and switches the source without tearing the stream down.
pub trait CaptureDriver: Send {
    fn configure(&mut self, config: CaptureConfig) -> Result<()>;
    fn start(&mut self, callbacks: CaptureCallbacks) -> Result<()>;
    fn stop(&mut self);
    fn set_device(&mut self, device_id: &str) -> Result<()>;
    fn set_mirrored(&mut self, mirrored: bool);
    fn is_running(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_map_to_supported_resolutions() {
        assert_eq!(CapturePreset::Low.dimensions(), (640, 480));
        assert_eq!(CapturePreset::Medium.dimensions(), (1280, 720));
        assert_eq!(CapturePreset::High.dimensions(), (1920, 1080));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(CaptureConfig::default().validate().is_ok());
    }

    #[test]
    fn sixty_fps_is_valid_above_low_preset() {
        let config = CaptureConfig {
            preset: CapturePreset::High,
            frame_rate: 60,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn low_preset_at_sixty_fps_is_rejected() {
        let config = CaptureConfig {
            preset: CapturePreset::Low,
            frame_rate: 60,
            ..CaptureConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn odd_frame_rates_are_rejected() {
        for rate in [0, 24, 25, 120] {
            let config = CaptureConfig {
                frame_rate: rate,
                ..CaptureConfig::default()
            };
            assert!(config.validate().is_err(), "rate {rate} accepted");
        }
    }

    #[test]
    fn config_serialises_to_camel_case() {
        let config = CaptureConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["preset"], "medium");
        assert_eq!(json["frameRate"], 30);
        assert!(json.get("frame_rate").is_none());
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: CaptureConfig = serde_json::from_str(r#"{"preset":"high"}"#).unwrap();
        assert_eq!(config.preset, CapturePreset::High);
        assert_eq!(config.frame_rate, 30);
    }
}
