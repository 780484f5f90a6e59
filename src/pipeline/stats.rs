use serde::Serialize;
use std::time::{Duration, Instant};

/// Minimum window before a new FPS value is reported.
const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Per-session pipeline counters.
///
/// Drops are counted by cause so backpressure (expected under load) is
/// distinguishable from transient faults.
pub struct PipelineStats {
    frames_completed: u64,
    backpressure_drops: u64,
    transient_errors: u64,
    pool_drops: u64,
    ring_drops: u64,
    preview_drops: u64,
    interval_start: Instant,
    interval_frames: u64,
    fps: f64,
}

/// Snapshot of pipeline stats for the host application.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub fps: f64,
    pub frames_completed: u64,
    pub backpressure_drops: u64,
    pub transient_errors: u64,
    pub pool_drops: u64,
    pub ring_drops: u64,
    pub preview_drops: u64,
    pub drop_rate: f64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            frames_completed: 0,
            backpressure_drops: 0,
            transient_errors: 0,
            pool_drops: 0,
            ring_drops: 0,
            preview_drops: 0,
            interval_start: Instant::now(),
            interval_frames: 0,
            fps: 0.0,
        }
    }

    /// Record a frame that made it through analyze and composite.
    pub fn record_completed(&mut self) {
        self.frames_completed += 1;
        self.interval_frames += 1;

        let elapsed = self.interval_start.elapsed();
        if elapsed >= REPORT_INTERVAL {
            self.fps = self.interval_frames as f64 / elapsed.as_secs_f64();
            self.interval_start = Instant::now();
            self.interval_frames = 0;
        }
    }

    /// The processing permit was unavailable at admission.
    pub fn record_backpressure_drop(&mut self) {
        self.backpressure_drops += 1;
    }

    /// Detector or render hiccup, recovered at the frame boundary.
    pub fn record_transient_error(&mut self) {
        self.transient_errors += 1;
    }

    /// Output pool had no free buffer.
    pub fn record_pool_drop(&mut self) {
        self.pool_drops += 1;
    }

    /// Ring was full or detached at publish time.
    pub fn record_ring_drop(&mut self) {
        self.ring_drops += 1;
    }

    /// The UI permit was unavailable; preview skipped.
    pub fn record_preview_drop(&mut self) {
        self.preview_drops += 1;
    }

    /// FPS over the last completed reporting interval.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frames_completed(&self) -> u64 {
        self.frames_completed
    }

    pub fn backpressure_drops(&self) -> u64 {
        self.backpressure_drops
    }

    /// Share of admitted-or-dropped frames that were dropped (0–100).
    pub fn drop_rate(&self) -> f64 {
        let drops = self.backpressure_drops + self.transient_errors + self.pool_drops;
        let total = self.frames_completed + drops;
        if total == 0 {
            return 0.0;
        }
        drops as f64 / total as f64 * 100.0
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            fps: self.fps,
            frames_completed: self.frames_completed,
            backpressure_drops: self.backpressure_drops,
            transient_errors: self.transient_errors,
            pool_drops: self.pool_drops,
            ring_drops: self.ring_drops,
            preview_drops: self.preview_drops,
            drop_rate: self.drop_rate(),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn counters_start_at_zero() {
        let stats = PipelineStats::new();
        assert_eq!(stats.frames_completed(), 0);
        assert_eq!(stats.fps(), 0.0);
        assert_eq!(stats.drop_rate(), 0.0);
    }

    #[test]
    fn completed_frames_accumulate() {
        let mut stats = PipelineStats::new();
        stats.record_completed();
        stats.record_completed();
        assert_eq!(stats.frames_completed(), 2);
    }

    #[test]
    fn fps_stays_zero_before_the_reporting_interval() {
        let mut stats = PipelineStats::new();
        for _ in 0..10 {
            stats.record_completed();
        }
        // Well under 500ms has elapsed
        assert_eq!(stats.fps(), 0.0);
    }

    #[test]
    fn fps_reports_after_the_interval_elapses() {
        let mut stats = PipelineStats::new();
        for _ in 0..5 {
            stats.record_completed();
        }
        thread::sleep(Duration::from_millis(510));
        stats.record_completed();
        assert!(stats.fps() > 0.0, "fps not reported: {}", stats.fps());
        // 6 frames over ~0.51s
        assert!(stats.fps() < 20.0);
    }

    #[test]
    fn drop_rate_mixes_all_frame_drop_causes() {
        let mut stats = PipelineStats::new();
        stats.record_completed();
        stats.record_completed();
        stats.record_backpressure_drop();
        stats.record_transient_error();
        // 2 drops out of 4 admitted-or-dropped
        assert!((stats.drop_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ring_and_preview_drops_do_not_count_as_frame_drops() {
        let mut stats = PipelineStats::new();
        stats.record_completed();
        stats.record_ring_drop();
        stats.record_preview_drop();
        assert_eq!(stats.drop_rate(), 0.0);
        let snap = stats.snapshot();
        assert_eq!(snap.ring_drops, 1);
        assert_eq!(snap.preview_drops, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut stats = PipelineStats::new();
        stats.record_completed();
        stats.record_backpressure_drop();
        stats.reset();
        assert_eq!(stats.frames_completed(), 0);
        assert_eq!(stats.backpressure_drops(), 0);
        assert_eq!(stats.drop_rate(), 0.0);
    }

    #[test]
    fn snapshot_serialises_to_camel_case() {
        let mut stats = PipelineStats::new();
        stats.record_completed();
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["framesCompleted"], 1);
        assert!(json["backpressureDrops"].is_number());
        assert!(json.get("frames_completed").is_none());
    }
}
