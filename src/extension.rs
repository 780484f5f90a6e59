//! Constants and helpers for the virtual-camera extension shell.
//!
//! The extension process attaches a [`RingConsumer`](crate::ring::RingConsumer)
//! and, on a fixed 33 ms cadence, wraps the latest published slot in a
//! sample buffer using the timing produced here.

use serde::Serialize;
use std::time::Duration;

/// Stable identity the extension reports to the host.
pub const PROVIDER_ID: &str = "com.anoncam.provider";
pub const DEVICE_ID: &str = "com.anoncam.device.source";
pub const STREAM_ID: &str = "com.anoncam.stream.source";
pub const MODEL_NAME: &str = "AnonCam-1";
pub const TRANSPORT: &str = "builtIn";

/// Fixed consumer dequeue cadence.
pub const DEQUEUE_INTERVAL: Duration = Duration::from_millis(33);

/// One advertised stream format, always BGRA8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
}

/// The formats enumerated at extension load.
pub const SUPPORTED_FORMATS: [StreamFormat; 5] = [
    StreamFormat {
        width: 1920,
        height: 1080,
        frame_rate: 30,
    },
    StreamFormat {
        width: 1920,
        height: 1080,
        frame_rate: 60,
    },
    StreamFormat {
        width: 1280,
        height: 720,
        frame_rate: 30,
    },
    StreamFormat {
        width: 1280,
        height: 720,
        frame_rate: 60,
    },
    StreamFormat {
        width: 640,
        height: 480,
        frame_rate: 30,
    },
];

/// Whether a resolution/rate pair is in the advertised table.
pub fn is_supported(width: u32, height: u32, frame_rate: u32) -> bool {
    SUPPORTED_FORMATS.iter().any(|f| {
        f.width == width && f.height == height && f.frame_rate == frame_rate
    })
}

/// Presentation timing for one dequeued slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleTiming {
    pub presentation_ns: u64,
    pub duration_ns: u64,
}

impl SampleTiming {
    /// Timing for a slot published at `timestamp_ns`; duration is fixed
    /// at 1/30 s regardless of the source rate.
    pub fn for_slot(timestamp_ns: u64) -> Self {
        Self {
            presentation_ns: timestamp_ns,
            duration_ns: 1_000_000_000 / 30,
        }
    }
}
