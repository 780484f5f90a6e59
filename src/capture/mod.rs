// Capture seam — driver trait, configuration, and the synthetic camera.

pub mod driver;
pub mod synthetic;

pub use driver::{CaptureCallbacks, CaptureConfig, CaptureDriver, CapturePreset};
pub use synthetic::{test_pattern, SyntheticCamera, SYNTHETIC_DEVICE_ID};
