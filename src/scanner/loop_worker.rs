use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    capture::{ActiveCapture, CaptureError, CaptureSource, FrameEncoder, DEFAULT_JPEG_QUALITY},
    classify::{ClassificationError, ClassificationResult, Classifier},
    metrics::{MetricsCollector, SampleMetrics, SampleStatus, TickOutcome},
};

use super::ledger::{RewardLedger, DEFAULT_REWARD_PULSE};
use super::projector::project;
use super::state::{SamplerStatus, ScannerSnapshot};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(1500);
pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub sample_interval: Duration,
    /// Upper bound on one classification round trip; an expired call is
    /// treated as a failed one so the loop keeps sampling.
    pub classify_timeout: Duration,
    pub reward_pulse: Duration,
    pub reward_cooldown: Option<Duration>,
    pub jpeg_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            classify_timeout: DEFAULT_CLASSIFY_TIMEOUT,
            reward_pulse: DEFAULT_REWARD_PULSE,
            reward_cooldown: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

struct SampleOutcome {
    result: Result<ClassificationResult, ClassificationError>,
    capture_ms: u64,
    encode_ms: u64,
    classify_ms: u64,
    payload_bytes: usize,
}

type PendingClassification = Pin<Box<dyn Future<Output = SampleOutcome> + Send>>;

/// Runs one scanning session until `cancel_token` fires.
///
/// All session state lives on this task: the capture guard, the reward
/// ledger, and the single pending classification. `pending.is_some()` is the
/// in-flight flag, so it is cleared on every way a call can end, including
/// the task being cancelled.
pub async fn sampling_loop(
    source: Box<dyn CaptureSource>,
    classifier: Arc<dyn Classifier>,
    config: SamplerConfig,
    snapshot_tx: watch::Sender<ScannerSnapshot>,
    metrics: MetricsCollector,
    cancel_token: CancellationToken,
) {
    snapshot_tx.send_replace(ScannerSnapshot::initializing());

    let mut capture = match ActiveCapture::acquire(source) {
        Ok(capture) => capture,
        Err(err) => {
            log_error!("scanner could not start: {err}");
            snapshot_tx.send_modify(|snapshot| snapshot.set_status(SamplerStatus::Error));
            return;
        }
    };

    let session_id = capture.session().id.clone();
    log_info!(
        "scanner session {} ready, sampling every {}ms",
        session_id,
        config.sample_interval.as_millis()
    );
    snapshot_tx.send_modify(|snapshot| {
        snapshot.session_id = Some(session_id.clone());
        snapshot.set_status(SamplerStatus::Ready);
    });

    let encoder = FrameEncoder::new(config.jpeg_quality);
    let mut ledger = RewardLedger::new(config.reward_pulse).with_cooldown(config.reward_cooldown);
    let mut pending: Option<PendingClassification> = None;

    let mut ticker = tokio::time::interval(config.sample_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut device_lost = false;

    loop {
        let pulse_deadline = ledger.pulse_deadline();

        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                log_info!("scanner session {} shutting down", session_id);
                break;
            }

            outcome = async {
                match pending.as_mut() {
                    Some(call) => call.await,
                    None => std::future::pending::<SampleOutcome>().await,
                }
            }, if pending.is_some() => {
                pending = None;
                apply_outcome(outcome, &mut ledger, &snapshot_tx, &metrics).await;
            }

            _ = tokio::time::sleep_until(pulse_deadline.unwrap_or_else(Instant::now)), if pulse_deadline.is_some() => {
                if ledger.expire_pulse(Instant::now()) {
                    let rewards = ledger.snapshot();
                    snapshot_tx.send_modify(|snapshot| snapshot.rewards = rewards);
                }
            }

            _ = ticker.tick() => {
                if pending.is_some() {
                    log_debug!("classification still in flight, skipping tick");
                    metrics.record_tick(TickOutcome::SkippedBusy).await;
                    continue;
                }

                let capture_start = Instant::now();
                let frame = match capture.current_frame() {
                    Ok(frame) => frame,
                    Err(CaptureError::FrameNotReady) => {
                        log_debug!("frame not ready, skipping tick");
                        metrics.record_tick(TickOutcome::FrameNotReady).await;
                        continue;
                    }
                    Err(err @ CaptureError::DeviceUnavailable(_)) => {
                        log_error!("scanner session {} lost its capture source: {err}", session_id);
                        metrics.record_tick(TickOutcome::DeviceLost).await;
                        device_lost = true;
                        break;
                    }
                };
                let capture_ms = capture_start.elapsed().as_millis() as u64;

                let encode_start = Instant::now();
                let payload = match encoder.encode(&frame) {
                    Ok(payload) => payload,
                    Err(err) => {
                        log_error!("frame encoding failed: {err}");
                        metrics.record_tick(TickOutcome::EncodeFailed).await;
                        let display = project(Some(&ClassificationResult::error()));
                        snapshot_tx.send_modify(|snapshot| snapshot.display = display);
                        continue;
                    }
                };
                let encode_ms = encode_start.elapsed().as_millis() as u64;

                log_debug!(
                    "dispatching {} byte frame (capture {}ms, encode {}ms)",
                    payload.byte_len,
                    capture_ms,
                    encode_ms
                );
                metrics.record_tick(TickOutcome::Dispatched).await;

                let payload_bytes = payload.byte_len;
                let classifier = Arc::clone(&classifier);
                let limit = config.classify_timeout;
                pending = Some(Box::pin(async move {
                    let started = Instant::now();
                    let result = match tokio::time::timeout(limit, classifier.classify(payload)).await {
                        Ok(result) => result,
                        Err(_) => Err(ClassificationError::Timeout(limit)),
                    };
                    SampleOutcome {
                        result,
                        capture_ms,
                        encode_ms,
                        classify_ms: started.elapsed().as_millis() as u64,
                        payload_bytes,
                    }
                }));
                snapshot_tx.send_modify(|snapshot| snapshot.in_flight = true);
            }
        }
    }

    // An unfinished call is dropped here; its result never reaches the ledger.
    if pending.take().is_some() {
        log_debug!("discarding in-flight classification for session {}", session_id);
    }
    capture.release();

    let final_status = if device_lost {
        SamplerStatus::Error
    } else {
        SamplerStatus::Stopped
    };
    snapshot_tx.send_modify(|snapshot| {
        snapshot.in_flight = false;
        snapshot.rewards.pulse_active = false;
        snapshot.set_status(final_status);
    });
    log_info!(
        "scanner session {} stopped with {} rewards",
        session_id,
        ledger.session_count()
    );
}

async fn apply_outcome(
    outcome: SampleOutcome,
    ledger: &mut RewardLedger,
    snapshot_tx: &watch::Sender<ScannerSnapshot>,
    metrics: &MetricsCollector,
) {
    let (result, status) = match outcome.result {
        Ok(result) => (result, SampleStatus::Classified),
        Err(err) => {
            log_warn!("classification failed after {}ms: {err}", outcome.classify_ms);
            let status = match err {
                ClassificationError::Timeout(_) => SampleStatus::TimedOut,
                _ => SampleStatus::Failed,
            };
            (ClassificationResult::error(), status)
        }
    };

    let rewarded = ledger.record_if_rewarded(&result, Instant::now());
    if rewarded {
        log_info!(
            "reward collected for '{}' ({} this session)",
            result.emotion,
            ledger.session_count()
        );
    } else {
        log_debug!(
            "classified '{}' at {:.1}% in {}ms",
            result.emotion,
            result.confidence,
            outcome.classify_ms
        );
    }

    let display = project(Some(&result));
    let rewards = ledger.snapshot();
    snapshot_tx.send_modify(|snapshot| {
        snapshot.in_flight = false;
        snapshot.display = display;
        snapshot.rewards = rewards;
    });

    metrics
        .record_sample(SampleMetrics {
            timestamp: Utc::now(),
            capture_ms: outcome.capture_ms,
            encode_ms: outcome.encode_ms,
            classify_ms: outcome.classify_ms,
            payload_bytes: outcome.payload_bytes,
            emotion: result.emotion,
            status,
            rewarded,
        })
        .await;
}
