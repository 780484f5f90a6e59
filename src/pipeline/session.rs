use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureCallbacks, CaptureConfig, CaptureDriver};
use crate::error::{PipelineError, Result};
use crate::face::{Detector, FaceAnalyzer, FaceMesh};
use crate::frame::FrameBuffer;
use crate::mask::{MaskGeometry, MaskStyle};
use crate::pipeline::executor::{ExecutorHandle, SerialExecutor};
use crate::pipeline::gate::PermitGate;
use crate::pipeline::stats::{PipelineStats, StatsSnapshot};
use crate::pose::FaceMapper;
use crate::render::{Compositor, MaskAssets, MaskTexture, SettingsCell};
use crate::ring::{Region, RingLayout, RingProducer};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopped = 3,
    Errored = 4,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopped,
            4 => Self::Errored,
            _ => Self::Idle,
        }
    }
}

/// User-visible session status.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineStatus {
    FaceDetected,
    NoFace,
    PermissionRequired,
    DeviceLost,
    Error(String),
}

impl PipelineStatus {
    /// Classify a raw driver error message.
    pub fn from_driver_message(msg: &str) -> Self {
        if msg.contains("EACCES") || msg.contains("not authorized") {
            Self::PermissionRequired
        } else if msg.contains("device lost") || msg.contains("disconnected") {
            Self::DeviceLost
        } else {
            Self::Error(msg.to_string())
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FaceDetected => write!(f, "Face detected"),
            Self::NoFace => write!(f, "No face"),
            Self::PermissionRequired => write!(f, "Camera permission required"),
            Self::DeviceLost => write!(f, "Camera device lost"),
            Self::Error(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Typed callbacks owned by the pipeline for its whole lifetime.
pub struct PipelineCallbacks {
    /// Composited frame for the preview surface; invoked on the UI executor.
    pub on_preview: Box<dyn Fn(&FrameBuffer, u64) + Send + Sync>,
    /// Status transitions; may fire from the processing or driver thread.
    pub on_status: Box<dyn Fn(&PipelineStatus) + Send + Sync>,
}

impl PipelineCallbacks {
    pub fn noop() -> Self {
        Self {
            on_preview: Box::new(|_, _| {}),
            on_status: Box::new(|_| {}),
        }
    }
}

/// Where published frames go.
pub enum RingBacking {
    /// No consumer process; publishing is skipped.
    Disabled,
    /// Fixed caller-provided region (tests, single-process hosts). The
    /// region must fit the session's output resolution.
    External(Arc<dyn Region>),
    /// Named POSIX shared memory, recreated whenever the output
    /// resolution changes.
    #[cfg(unix)]
    SharedMemory(String),
}

/// Lazily (re)creates the ring to match the output resolution and keeps
/// publish failures contained (§7: ring errors never propagate).
struct RingSink {
    backing: RingBacking,
    producer: Option<RingProducer>,
}

impl RingSink {
    fn new(backing: RingBacking) -> Self {
        Self {
            backing,
            producer: None,
        }
    }

    /// `Ok(false)` means the ring was full; errors mean no ring could be
    /// stood up for this resolution.
    fn publish(&mut self, frame: &FrameBuffer) -> Result<bool> {
        if matches!(self.backing, RingBacking::Disabled) {
            return Ok(true);
        }

        let stale = self.producer.as_ref().is_some_and(|p| {
            let layout = p.layout();
            layout.width != frame.width || layout.height != frame.height
        });
        if stale {
            self.producer = None;
        }

        if self.producer.is_none() {
            self.producer = Some(self.create_producer(frame.width, frame.height)?);
        }
        self.producer
            .as_mut()
            .expect("producer just created")
            .publish(frame)
    }

    fn create_producer(&self, width: u32, height: u32) -> Result<RingProducer> {
        match &self.backing {
            RingBacking::Disabled => unreachable!("publish short-circuits Disabled"),
            RingBacking::External(region) => {
                RingProducer::create(Arc::clone(region), width, height)
            }
            #[cfg(unix)]
            RingBacking::SharedMemory(name) => {
                let layout = RingLayout::new(width, height);
                let region =
                    crate::ring::SharedMemoryRegion::create(name, layout.total_size())?;
                RingProducer::create(Arc::new(region), width, height)
            }
        }
    }
}

/// State shared between the driver, processing, and UI threads.
struct Shared {
    state: AtomicU8,
    processing_gate: PermitGate,
    ui_gate: PermitGate,
    settings: SettingsCell,
    stats: Mutex<PipelineStats>,
    callbacks: PipelineCallbacks,
    epoch: Instant,
    /// 0 = unknown, 1 = face, 2 = no face; status fires on change only.
    face_state: AtomicU8,
}

impl Shared {
    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn emit_status(&self, status: PipelineStatus) {
        (self.callbacks.on_status)(&status);
    }

    fn update_face_status(&self, present: bool) {
        let next = if present { 1 } else { 2 };
        let prev = self.face_state.swap(next, Ordering::AcqRel);
        if prev != next {
            self.emit_status(if present {
                PipelineStatus::FaceDetected
            } else {
                PipelineStatus::NoFace
            });
        }
    }
}

/// Everything owned by the processing executor.
struct Core {
    analyzer: FaceAnalyzer,
    compositor: Box<dyn Compositor>,
    mapper: FaceMapper,
    /// Geometry for the most recently used style.
    style_cache: Option<(MaskStyle, MaskGeometry)>,
    texture: Option<MaskTexture>,
    ring: RingSink,
}

impl Core {
    fn geometry_for(&mut self, style: MaskStyle) -> &MaskGeometry {
        if self.style_cache.as_ref().map(|(s, _)| *s) != Some(style) {
            self.style_cache = Some((style, style.build()));
        }
        &self.style_cache.as_ref().expect("cache just filled").1
    }
}

/// One capture session end-to-end: admission, analysis, compositing,
/// ring publish, preview.
///
/// The pipeline is the ownership root: it owns the capture driver, the
/// detector (through the analyzer), the compositor with its output pool,
/// the ring producer, and both executors. The UI shell holds a handle to
/// the pipeline, never the other way around.
pub struct FramePipeline {
    driver: Box<dyn CaptureDriver>,
    config: CaptureConfig,
    shared: Arc<Shared>,
    core: Arc<Mutex<Core>>,
    processing: SerialExecutor,
    ui: SerialExecutor,
}

impl FramePipeline {
    pub fn new(
        driver: Box<dyn CaptureDriver>,
        detector: Box<dyn Detector>,
        compositor: Box<dyn Compositor>,
        config: CaptureConfig,
        ring: RingBacking,
        callbacks: PipelineCallbacks,
    ) -> Self {
        Self {
            driver,
            config,
            shared: Arc::new(Shared {
                state: AtomicU8::new(PipelineState::Idle as u8),
                processing_gate: PermitGate::new(),
                ui_gate: PermitGate::new(),
                settings: SettingsCell::default(),
                stats: Mutex::new(PipelineStats::new()),
                callbacks,
                epoch: Instant::now(),
                face_state: AtomicU8::new(0),
            }),
            core: Arc::new(Mutex::new(Core {
                analyzer: FaceAnalyzer::new(detector),
                compositor,
                mapper: FaceMapper::new(),
                style_cache: None,
                texture: None,
                ring: RingSink::new(ring),
            })),
            processing: SerialExecutor::new("anoncam-processing"),
            ui: SerialExecutor::new("anoncam-ui"),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Settings cell; the UI executor writes, the renderer reads.
    pub fn settings(&self) -> &SettingsCell {
        &self.shared.settings
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.lock().snapshot()
    }

    /// Configure the driver and begin capturing. No-op when already
    /// Starting or Running; configuration failures land in Errored
    /// without ever entering Running.
    pub fn start(&mut self, device_id: &str) -> Result<()> {
        match self.shared.state() {
            PipelineState::Starting | PipelineState::Running => return Ok(()),
            _ => {}
        }

        self.config.device_id = device_id.to_string();
        if let Err(e) = self.try_start() {
            self.shared.set_state(PipelineState::Errored);
            self.shared
                .emit_status(PipelineStatus::Error(e.to_string()));
            return Err(e);
        }
        Ok(())
    }

    fn try_start(&mut self) -> Result<()> {
        self.config.validate()?;
        self.driver.configure(self.config.clone())?;
        self.shared.set_state(PipelineState::Starting);
        self.shared.stats.lock().reset();

        let callbacks = capture_callbacks(
            Arc::clone(&self.shared),
            Arc::clone(&self.core),
            self.processing.handle(),
            self.ui.handle(),
        );
        self.driver.start(callbacks)?;
        info!(device = %self.config.device_id, "capture session starting");
        Ok(())
    }

    /// Stop capturing. In-flight frames finish processing but are not
    /// published. Idempotent.
    pub fn stop(&mut self) {
        if self.shared.state() == PipelineState::Stopped {
            return;
        }
        self.driver.stop();
        self.shared.set_state(PipelineState::Stopped);
        info!("capture session stopped");
    }

    /// Switch the capture source; output resolution may change on the
    /// next frame.
    pub fn set_device(&mut self, device_id: &str) -> Result<()> {
        self.driver.set_device(device_id)?;
        self.config.device_id = device_id.to_string();
        Ok(())
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.driver.set_mirrored(mirrored);
    }

    /// Load a replacement-face texture. The face found in it (if any) is
    /// registered for landmark-to-landmark UV mapping. Runs on the
    /// processing executor.
    pub fn set_mask_texture(&self, image: image::DynamicImage) {
        let core = Arc::clone(&self.core);
        self.processing.submit(move || {
            let frame = bgra_frame_from_image(&image);
            let mut core = core.lock();
            core.texture = Some(MaskTexture::from_image(&image));

            match core.analyzer.analyze(&frame.as_frame()) {
                Ok(obs) => {
                    match FaceMesh::from_observation(&obs) {
                        Some(mesh) => {
                            info!("registered texture face for UV mapping");
                            core.mapper.set_texture_face(mesh);
                        }
                        None => {
                            debug!("no face in mask texture; plain texture mapping");
                            core.mapper.clear_texture_face();
                        }
                    }
                    core.analyzer.reset();
                }
                Err(e) => warn!("texture face detection failed: {e}"),
            }
        });
    }

    pub fn clear_mask_texture(&self) {
        let core = Arc::clone(&self.core);
        self.processing.submit(move || {
            let mut core = core.lock();
            core.texture = None;
            core.mapper.clear_texture_face();
        });
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.driver.stop();
        self.shared.set_state(PipelineState::Stopped);
    }
}

/// Admission control on the driver thread: take the processing permit or
/// drop the frame, copy the borrowed frame, and hand off.
fn capture_callbacks(
    shared: Arc<Shared>,
    core: Arc<Mutex<Core>>,
    processing: ExecutorHandle,
    ui: ExecutorHandle,
) -> CaptureCallbacks {
    let error_shared = Arc::clone(&shared);
    CaptureCallbacks {
        on_frame: Box::new(move |frame| {
            match shared.state() {
                PipelineState::Starting | PipelineState::Running => {}
                _ => return,
            }
            let Some(permit) = shared.processing_gate.try_acquire() else {
                shared.stats.lock().record_backpressure_drop();
                return;
            };

            let owned = frame.to_owned_buffer();
            let shared = Arc::clone(&shared);
            let core = Arc::clone(&core);
            let ui = ui.clone();
            processing.submit(move || {
                process_one(&shared, &core, &ui, owned);
                drop(permit);
            });
        }),
        on_error: Box::new(move |msg| {
            error!("capture driver error: {msg}");
            error_shared.set_state(PipelineState::Errored);
            error_shared.emit_status(PipelineStatus::from_driver_message(msg));
        }),
    }
}

/// One frame through analyze → pose/map → composite → publish → preview,
/// entirely on the processing executor.
fn process_one(
    shared: &Arc<Shared>,
    core_arc: &Arc<Mutex<Core>>,
    ui: &ExecutorHandle,
    frame: FrameBuffer,
) {
    let mut core = core_arc.lock();
    let settings = shared.settings.snapshot();

    let observation = match core.analyzer.analyze(&frame.as_frame()) {
        Ok(obs) => obs,
        Err(e) => {
            warn!("dropping frame: {e}");
            shared.stats.lock().record_transient_error();
            return;
        }
    };
    shared.update_face_status(observation.present);

    let use_mask = settings.mask_enabled && observation.present;
    if use_mask {
        core.geometry_for(settings.style);
    }

    // Split borrows: the compositor is &mut while the mask assets borrow
    // the geometry and texture fields.
    let Core {
        compositor,
        mapper,
        style_cache,
        texture,
        ring,
        ..
    } = &mut *core;

    let mapped_geometry;
    let assets = if use_mask {
        let (_, cached) = style_cache.as_ref().expect("geometry cached above");
        let geometry = if texture.is_some() && mapper.has_texture_face() {
            match FaceMesh::from_observation(&observation) {
                Some(mesh) => {
                    let uvs = mapper.generate_uvs(cached.vertices(), Some(&mesh));
                    let mut remapped = cached.clone();
                    remapped
                        .set_uvs(uvs)
                        .expect("mapper yields one uv per vertex");
                    mapped_geometry = remapped;
                    &mapped_geometry
                }
                None => cached,
            }
        } else {
            cached
        };
        Some(MaskAssets {
            geometry,
            texture: texture.as_ref(),
            flat: settings.style.is_flat(),
        })
    } else {
        None
    };

    let time_s = shared.epoch.elapsed().as_secs_f32();
    let output = match compositor.composite(
        &frame.as_frame(),
        &observation,
        &settings,
        assets.as_ref(),
        time_s,
    ) {
        Ok(out) => out,
        Err(PipelineError::PoolExhausted) => {
            shared.stats.lock().record_pool_drop();
            return;
        }
        Err(e) => {
            warn!("render failed, dropping frame: {e}");
            shared.stats.lock().record_transient_error();
            return;
        }
    };

    // First completed frame flips Starting into Running
    if shared.transition(PipelineState::Starting, PipelineState::Running) {
        info!("pipeline running");
    }

    if shared.state() == PipelineState::Running {
        match ring.publish(&output) {
            Ok(true) => {}
            Ok(false) => shared.stats.lock().record_ring_drop(),
            Err(e) => {
                debug!("ring publish unavailable: {e}");
                shared.stats.lock().record_ring_drop();
            }
        }
    }
    shared.stats.lock().record_completed();

    if shared.state() != PipelineState::Running {
        compositor.recycle(output);
        return;
    }

    match shared.ui_gate.try_acquire() {
        Some(ui_permit) => {
            let shared = Arc::clone(shared);
            let core_arc = Arc::clone(core_arc);
            let timestamp = output.timestamp_ns;
            ui.submit(move || {
                (shared.callbacks.on_preview)(&output, timestamp);
                core_arc.lock().compositor.recycle(output);
                drop(ui_permit);
            });
        }
        None => {
            shared.stats.lock().record_preview_drop();
            compositor.recycle(output);
        }
    }
}

/// Decode an image into the pipeline's BGRA frame form.
fn bgra_frame_from_image(image: &image::DynamicImage) -> FrameBuffer {
    let rgba = image.to_rgba8();
    let (width, height) = (rgba.width(), rgba.height());
    let mut frame = FrameBuffer::new(width, height, 0);
    for (dst, src) in frame
        .data
        .chunks_exact_mut(4)
        .zip(rgba.as_raw().chunks_exact(4))
    {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = src[3];
    }
    frame
}
