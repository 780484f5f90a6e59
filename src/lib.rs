//! AnonCam — realtime camera anonymization pipeline core.
//!
//! Acquires frames from a capture driver, locates a face, composites a
//! privacy overlay (pixelation or a pose-locked 3D mask), and republishes
//! the result through a shared-memory ring to a virtual-camera consumer.
//!
//! Module map:
//!
//! - **`capture`**: capture-driver seam and the synthetic test camera
//! - **`face`**: detector seam, observation normalization, 68-point schema
//! - **`pose`**: head rotation, screen placement, landmark UV mapping
//! - **`mask`**: overlay geometry variants
//! - **`render`**: compositor, software raster backend, output pool, settings
//! - **`ring`**: triple-buffered shared-memory SPSC frame ring
//! - **`pipeline`**: session orchestration, executors, admission gates
//! - **`extension`**: identity and timing constants for the consumer shell

pub mod capture;
pub mod error;
pub mod extension;
pub mod face;
pub mod frame;
pub mod mask;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod ring;

pub use capture::{CaptureConfig, CaptureDriver, CapturePreset, SyntheticCamera};
pub use error::{PipelineError, Result};
pub use face::{Detector, FaceAnalyzer, FaceObservation};
pub use frame::{Frame, FrameBuffer};
pub use mask::{MaskGeometry, MaskStyle};
pub use pipeline::{
    FramePipeline, PipelineCallbacks, PipelineState, PipelineStatus, RingBacking,
};
pub use render::{Compositor, RenderSettings, SoftwareCompositor};
pub use ring::{RingConsumer, RingProducer};
