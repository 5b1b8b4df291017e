use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a single sampling tick did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TickOutcome {
    Dispatched,
    SkippedBusy,
    FrameNotReady,
    EncodeFailed,
    /// The capture device went away mid-session; the session ends.
    DeviceLost,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SampleStatus {
    Classified,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleMetrics {
    pub timestamp: DateTime<Utc>,
    pub capture_ms: u64,
    pub encode_ms: u64,
    pub classify_ms: u64,
    pub payload_bytes: usize,
    pub emotion: String,
    pub status: SampleStatus,
    pub rewarded: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub system: SystemMetrics,
    pub recent_samples: Vec<SampleMetrics>,
    pub tick_count: u64,
    pub dispatched_count: u64,
    pub skipped_busy_count: u64,
    pub frame_not_ready_count: u64,
    pub encode_failed_count: u64,
    pub device_lost_count: u64,
    pub classified_count: u64,
    pub failed_count: u64,
    pub timeout_count: u64,
    pub reward_count: u64,
}
