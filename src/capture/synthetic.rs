use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::capture::driver::{CaptureCallbacks, CaptureConfig, CaptureDriver};
use crate::error::{PipelineError, Result};
use crate::frame::FrameBuffer;

/// Device id accepted by the synthetic camera.
pub const SYNTHETIC_DEVICE_ID: &str = "synthetic:test:camera-001";

/// Generated camera for tests and headless runs.
///
/// Spawns a named thread that emits a moving checkerboard at the
/// configured preset and rate until stopped. Stands in for a platform
/// capture driver wherever one is unavailable.
pub struct SyntheticCamera {
    config: CaptureConfig,
    running: Arc<AtomicBool>,
    mirrored: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            config: CaptureConfig::default(),
            running: Arc::new(AtomicBool::new(false)),
            mirrored: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

/// Checkerboard with a sweeping bright band, varying per sequence number.
pub fn test_pattern(width: u32, height: u32, sequence: u64) -> FrameBuffer {
    let mut buf = FrameBuffer::new(width, height, 0);
    let band = (sequence * 7 % width.max(1) as u64) as u32;
    for y in 0..height {
        for x in 0..width {
            let checker = ((x / 16 + y / 16) % 2) as u8 * 120 + 60;
            let boost = if x.abs_diff(band) < 8 { 60 } else { 0 };
            let v = checker.saturating_add(boost);
            buf.set_pixel(x, y, [v, v, v, 255]);
        }
    }
    buf
}

impl CaptureDriver for SyntheticCamera {
    fn configure(&mut self, config: CaptureConfig) -> Result<()> {
        config.validate()?;
        if self.is_running() {
            return Err(PipelineError::Config(
                "cannot reconfigure while running".to_string(),
            ));
        }
        self.config = config;
        Ok(())
    }

    fn start(&mut self, callbacks: CaptureCallbacks) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        if !self.config.device_id.is_empty() && self.config.device_id != SYNTHETIC_DEVICE_ID {
            return Err(PipelineError::DeviceNotFound(self.config.device_id.clone()));
        }

        let (width, height) = self.config.preset.dimensions();
        let interval = Duration::from_nanos(1_000_000_000 / self.config.frame_rate as u64);
        let running = Arc::clone(&self.running);
        let mirrored = Arc::clone(&self.mirrored);
        running.store(true, Ordering::Release);

        let thread = std::thread::Builder::new()
            .name("capture-synthetic".to_string())
            .spawn(move || {
                info!(width, height, "synthetic capture thread starting");
                let epoch = Instant::now();
                let mut sequence = 0u64;
                while running.load(Ordering::Acquire) {
                    let mut frame = test_pattern(width, height, sequence);
                    if mirrored.load(Ordering::Acquire) {
                        frame.flip_horizontal();
                    }
                    frame.timestamp_ns = epoch.elapsed().as_nanos() as u64;
                    (callbacks.on_frame)(frame.as_frame());
                    sequence += 1;
                    std::thread::sleep(interval);
                }
                info!("synthetic capture thread exiting");
            })
            .map_err(|e| {
                error!("failed to spawn capture thread: {e}");
                PipelineError::Fatal(format!("capture thread spawn failed: {e}"))
            })?;

        self.thread = Some(thread);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn set_device(&mut self, device_id: &str) -> Result<()> {
        if !device_id.is_empty() && device_id != SYNTHETIC_DEVICE_ID {
            return Err(PipelineError::DeviceNotFound(device_id.to_string()));
        }
        self.config.device_id = device_id.to_string();
        Ok(())
    }

    fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored.store(mirrored, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}
