mod types;

pub use types::{MetricsSnapshot, SampleMetrics, SampleStatus, SystemMetrics, TickOutcome};

use std::sync::Arc;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::Mutex;

const MAX_RECENT_SAMPLES: usize = 20;

/// Tick and sample statistics for the running scanner, shared between the
/// sampling task and whoever wants to display them.
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

struct MetricsState {
    recent_samples: Vec<SampleMetrics>,
    tick_count: u64,
    dispatched_count: u64,
    skipped_busy_count: u64,
    frame_not_ready_count: u64,
    encode_failed_count: u64,
    device_lost_count: u64,
    classified_count: u64,
    failed_count: u64,
    timeout_count: u64,
    reward_count: u64,
    system: System,
    pid: Pid,
}

impl MetricsState {
    fn clear_counters(&mut self) {
        self.recent_samples.clear();
        self.tick_count = 0;
        self.dispatched_count = 0;
        self.skipped_busy_count = 0;
        self.frame_not_ready_count = 0;
        self.encode_failed_count = 0;
        self.device_lost_count = 0;
        self.classified_count = 0;
        self.failed_count = 0;
        self.timeout_count = 0;
        self.reward_count = 0;
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut system = System::new();
        let pid = Pid::from_u32(std::process::id());

        // Initial refresh to establish baseline for CPU calculation
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        Self {
            inner: Arc::new(Mutex::new(MetricsState {
                recent_samples: Vec::with_capacity(MAX_RECENT_SAMPLES),
                tick_count: 0,
                dispatched_count: 0,
                skipped_busy_count: 0,
                frame_not_ready_count: 0,
                encode_failed_count: 0,
                device_lost_count: 0,
                classified_count: 0,
                failed_count: 0,
                timeout_count: 0,
                reward_count: 0,
                system,
                pid,
            })),
        }
    }

    pub async fn record_tick(&self, outcome: TickOutcome) {
        let mut state = self.inner.lock().await;
        state.tick_count += 1;
        match outcome {
            TickOutcome::Dispatched => state.dispatched_count += 1,
            TickOutcome::SkippedBusy => state.skipped_busy_count += 1,
            TickOutcome::FrameNotReady => state.frame_not_ready_count += 1,
            TickOutcome::EncodeFailed => state.encode_failed_count += 1,
            TickOutcome::DeviceLost => state.device_lost_count += 1,
        }
    }

    pub async fn record_sample(&self, sample: SampleMetrics) {
        let mut state = self.inner.lock().await;

        match sample.status {
            SampleStatus::Classified => state.classified_count += 1,
            SampleStatus::Failed => state.failed_count += 1,
            SampleStatus::TimedOut => state.timeout_count += 1,
        }
        if sample.rewarded {
            state.reward_count += 1;
        }

        state.recent_samples.push(sample);
        if state.recent_samples.len() > MAX_RECENT_SAMPLES {
            state.recent_samples.remove(0);
        }
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let mut state = self.inner.lock().await;
        let pid = state.pid;

        // Refresh to get current CPU/RAM
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));

        let system = match state.system.process(pid) {
            Some(process) => SystemMetrics {
                cpu_percent: process.cpu_usage(),
                memory_mb: process.memory() as f64 / 1024.0 / 1024.0,
            },
            None => SystemMetrics::default(),
        };

        MetricsSnapshot {
            system,
            recent_samples: state.recent_samples.clone(),
            tick_count: state.tick_count,
            dispatched_count: state.dispatched_count,
            skipped_busy_count: state.skipped_busy_count,
            frame_not_ready_count: state.frame_not_ready_count,
            encode_failed_count: state.encode_failed_count,
            device_lost_count: state.device_lost_count,
            classified_count: state.classified_count,
            failed_count: state.failed_count,
            timeout_count: state.timeout_count,
            reward_count: state.reward_count,
        }
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        let pid = state.pid;
        state.clear_counters();
        // Re-establish baseline for CPU after reset
        state.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(status: SampleStatus, rewarded: bool) -> SampleMetrics {
        SampleMetrics {
            timestamp: Utc::now(),
            capture_ms: 1,
            encode_ms: 4,
            classify_ms: 120,
            payload_bytes: 20_000,
            emotion: "happy".into(),
            status,
            rewarded,
        }
    }

    #[tokio::test]
    async fn counts_ticks_by_outcome() {
        let metrics = MetricsCollector::new();
        metrics.record_tick(TickOutcome::Dispatched).await;
        metrics.record_tick(TickOutcome::SkippedBusy).await;
        metrics.record_tick(TickOutcome::SkippedBusy).await;
        metrics.record_tick(TickOutcome::FrameNotReady).await;
        metrics.record_tick(TickOutcome::DeviceLost).await;

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.tick_count, 5);
        assert_eq!(snapshot.dispatched_count, 1);
        assert_eq!(snapshot.skipped_busy_count, 2);
        assert_eq!(snapshot.frame_not_ready_count, 1);
        assert_eq!(snapshot.device_lost_count, 1);
    }

    #[tokio::test]
    async fn keeps_a_bounded_window_of_samples() {
        let metrics = MetricsCollector::new();
        for i in 0..(MAX_RECENT_SAMPLES + 5) {
            metrics.record_sample(sample(SampleStatus::Classified, i % 2 == 0)).await;
        }
        metrics.record_sample(sample(SampleStatus::TimedOut, false)).await;

        let snapshot = metrics.get_snapshot().await;
        assert_eq!(snapshot.recent_samples.len(), MAX_RECENT_SAMPLES);
        assert_eq!(snapshot.classified_count, (MAX_RECENT_SAMPLES + 5) as u64);
        assert_eq!(snapshot.timeout_count, 1);
        assert_eq!(snapshot.reward_count, 13);
        assert_eq!(
            snapshot.recent_samples.last().map(|s| s.status),
            Some(SampleStatus::TimedOut)
        );
    }

    #[tokio::test]
    async fn reset_is_shared_by_clones() {
        let metrics = MetricsCollector::new();
        let handle = metrics.clone();
        handle.record_tick(TickOutcome::Dispatched).await;
        handle.record_sample(sample(SampleStatus::Failed, false)).await;

        metrics.reset().await;
        let snapshot = handle.get_snapshot().await;
        assert_eq!(snapshot.tick_count, 0);
        assert_eq!(snapshot.failed_count, 0);
        assert!(snapshot.recent_samples.is_empty());
    }
}
