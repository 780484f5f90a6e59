use serde::{Deserialize, Serialize};

use crate::mask::MaskStyle;

/// Default pixelation grid cell, as a fraction of the frame.
pub const DEFAULT_PIXEL_SIZE: f32 = 0.03;

/// Render-time settings published by the UI and read once per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderSettings {
    pub mask_enabled: bool,
    pub style: MaskStyle,
    /// RGBA in [0, 1].
    pub mask_color: [f32; 4],
    pub pixelate: bool,
    pub pixel_size: f32,
    pub mask_scale: f32,
    pub debug_overlay: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mask_enabled: true,
            style: MaskStyle::Helmet,
            mask_color: [0.35, 0.45, 0.85, 1.0],
            pixelate: false,
            pixel_size: DEFAULT_PIXEL_SIZE,
            mask_scale: 1.0,
            debug_overlay: false,
        }
    }
}

/// Hand-off cell between the UI executor (writer) and the processing
/// executor (reader).
///
/// Each `publish` replaces the whole value under the lock, and the
/// renderer takes one `snapshot` per frame, so a frame always observes
/// either the old or the new settings, never a torn mix.
#[derive(Debug, Default)]
pub struct SettingsCell {
    inner: parking_lot::Mutex<RenderSettings>,
}

impl SettingsCell {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            inner: parking_lot::Mutex::new(settings),
        }
    }

    pub fn publish(&self, settings: RenderSettings) {
        *self.inner.lock() = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut RenderSettings)) {
        f(&mut self.inner.lock());
    }

    pub fn snapshot(&self) -> RenderSettings {
        self.inner.lock().clone()
    }
}
