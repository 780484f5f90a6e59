use thiserror::Error;

/// Pipeline error taxonomy.
///
/// Frame-scoped kinds (`Detector`, `Render`, `Backpressure`, `PoolExhausted`,
/// `RingDetached`) are recovered at the frame boundary: the frame is dropped,
/// a counter is bumped, and the session keeps running. `Config` and `Fatal`
/// surface to the session owner and stop the pipeline from (or in) Running.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("detector failed: {0}")]
    Detector(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("frame dropped under backpressure")]
    Backpressure,

    #[error("output pool exhausted")]
    PoolExhausted,

    #[error("ring detached: {0}")]
    RingDetached(String),

    #[error("ring layout invalid: {0}")]
    RingLayout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no camera device: {0}")]
    DeviceNotFound(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl PipelineError {
    /// Whether the error is recoverable at the frame boundary.
    pub fn is_frame_scoped(&self) -> bool {
        matches!(
            self,
            Self::Detector(_)
                | Self::Render(_)
                | Self::Backpressure
                | Self::PoolExhausted
                | Self::RingDetached(_)
        )
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Known low-level failure markers and their user-friendly translations.
const MESSAGE_TRANSLATIONS: &[(&str, &str)] = &[
    ("EACCES", "Camera permission required"),
    ("not authorized", "Camera permission required"),
    ("device lost", "Camera device lost — reconnect and restart"),
    ("GPU device lost", "Graphics device lost — restart the session"),
    ("EBUSY", "Camera is in use by another application"),
];

/// Map a raw error message to the string shown in the status line.
///
/// Unknown messages pass through with an "Error: " prefix so the UI shell
/// never renders a bare OS error code.
pub fn user_message(msg: &str) -> String {
    for &(marker, friendly) in MESSAGE_TRANSLATIONS {
        if msg.contains(marker) {
            return friendly.to_string();
        }
    }
    format!("Error: {msg}")
}
