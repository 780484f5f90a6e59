// Pipeline domain — session orchestration, executors, gates, counters.

pub mod executor;
pub mod gate;
pub mod session;
pub mod stats;

pub use executor::{ExecutorHandle, SerialExecutor};
pub use gate::{PermitGate, PermitGuard};
pub use session::{
    FramePipeline, PipelineCallbacks, PipelineState, PipelineStatus, RingBacking,
};
pub use stats::{PipelineStats, StatsSnapshot};
