use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::CaptureSource;
use crate::classify::Classifier;
use crate::metrics::MetricsCollector;

use super::loop_worker::{sampling_loop, SamplerConfig};
use super::state::ScannerSnapshot;

/// Start/stop lifecycle around one sampling task at a time.
///
/// Presentation code reads state through [`ScannerController::subscribe`] and
/// never touches the session directly. Dropping the controller cancels the
/// running session, which then releases its capture device.
pub struct ScannerController {
    config: SamplerConfig,
    classifier: Arc<dyn Classifier>,
    metrics: MetricsCollector,
    snapshot_tx: watch::Sender<ScannerSnapshot>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ScannerController {
    pub fn new(config: SamplerConfig, classifier: Arc<dyn Classifier>) -> Self {
        let (snapshot_tx, _) = watch::channel(ScannerSnapshot::default());
        Self {
            config,
            classifier,
            metrics: MetricsCollector::new(),
            snapshot_tx,
            handle: None,
            cancel_token: None,
        }
    }

    /// Opens `source` and begins sampling. Every start is a new session with
    /// its reward count back at zero.
    pub async fn start(&mut self, source: Box<dyn CaptureSource>) -> Result<()> {
        if let Some(handle) = &self.handle {
            if !handle.is_finished() {
                bail!("scanner already active");
            }
        }
        // A session that ended on its own (device failure) still needs reaping.
        self.stop().await?;

        self.metrics.reset().await;
        self.snapshot_tx.send_replace(ScannerSnapshot::initializing());

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(sampling_loop(
            source,
            Arc::clone(&self.classifier),
            self.config.clone(),
            self.snapshot_tx.clone(),
            self.metrics.clone(),
            cancel_token.clone(),
        ));

        info!(
            "scanner started (interval {}ms, timeout {}ms)",
            self.config.sample_interval.as_millis(),
            self.config.classify_timeout.as_millis()
        );

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancels ticking and waits until the capture device has been released.
    /// A classification still in flight is abandoned. Safe to call when idle.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("scanner task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> watch::Receiver<ScannerSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> ScannerSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }
}

impl Drop for ScannerController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
