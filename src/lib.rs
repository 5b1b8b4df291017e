pub mod capture;
pub mod classify;
pub mod metrics;
pub mod scanner;
pub mod settings;
mod utils;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use capture::{CaptureSource, StillImageSource};
use classify::HttpClassifier;
use scanner::{SamplerStatus, ScannerController, ScannerSnapshot};
use settings::{ScannerSettings, SettingsStore};

const DEFAULT_SETTINGS_FILE: &str = "emoscan.json";

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if settings::debug_mode() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("emoscan starting up...");

    let settings_path = std::env::var("EMOSCAN_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let store = SettingsStore::new(settings_path)?;
    let mut settings = store.scanner();
    settings.apply_env_overrides();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(run_scanner(settings))
}

async fn run_scanner(settings: ScannerSettings) -> Result<()> {
    let classifier = HttpClassifier::new(&settings.endpoint, settings.classify_timeout())?
        .with_bearer_token(settings.auth_token.clone());
    info!("classifying against {}", classifier.endpoint());

    let mut controller = ScannerController::new(settings.sampler_config(), Arc::new(classifier));
    let mut updates = controller.subscribe();

    controller.start(build_source(&settings)).await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // in_flight flips on every tick; only log what a viewer would notice.
    let mut last_logged = None;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let visible = (snapshot.status, snapshot.display.clone(), snapshot.rewards);
                if last_logged.as_ref() != Some(&visible) {
                    log_snapshot(&snapshot);
                    last_logged = Some(visible);
                }
                if snapshot.status == SamplerStatus::Error {
                    break;
                }
            }
            result = &mut shutdown => {
                if let Err(err) = result {
                    warn!("failed to listen for ctrl-c: {err}");
                }
                info!("interrupt received, stopping scanner");
                break;
            }
        }
    }

    controller.stop().await?;

    let metrics = controller.metrics().get_snapshot().await;
    let final_state = controller.snapshot();
    info!(
        "session summary: {} rewards, {} ticks ({} dispatched, {} skipped busy, {} frame not ready, {} device lost), {} classified, {} failed, {} timed out",
        final_state.rewards.session_count,
        metrics.tick_count,
        metrics.dispatched_count,
        metrics.skipped_busy_count,
        metrics.frame_not_ready_count,
        metrics.device_lost_count,
        metrics.classified_count,
        metrics.failed_count,
        metrics.timeout_count
    );

    if final_state.status == SamplerStatus::Error {
        bail!("scanner lost access to its capture source");
    }
    Ok(())
}

fn build_source(settings: &ScannerSettings) -> Box<dyn CaptureSource> {
    let source = match &settings.frame_path {
        Some(path) => {
            info!("using still frame {}", path.display());
            StillImageSource::from_path(path)
        }
        None => {
            info!("no frame configured, using synthetic capture");
            StillImageSource::synthetic()
        }
    };
    Box::new(source.with_warmup_frames(settings.warmup_frames))
}

fn log_snapshot(snapshot: &ScannerSnapshot) {
    match snapshot.status {
        SamplerStatus::Error => warn!(
            "{}",
            snapshot.status_message.as_deref().unwrap_or("scanner error")
        ),
        SamplerStatus::Ready => info!(
            "{} ({:.0}%) - {} | rewards: {}{}",
            snapshot.display.label,
            snapshot.display.confidence_percent,
            snapshot.display.message,
            snapshot.rewards.session_count,
            if snapshot.rewards.pulse_active {
                " +1!"
            } else {
                ""
            }
        ),
        status => info!(
            "scanner {:?}{}",
            status,
            snapshot
                .status_message
                .as_deref()
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        ),
    }
}
