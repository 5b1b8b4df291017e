//! Scripted capture and classifier doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tokio::sync::Semaphore;

use crate::capture::{CaptureError, CaptureSession, CaptureSource, FramePayload, RawFrame};
use crate::classify::{ClassificationError, ClassificationResult, Classifier, RewardStatus};

#[derive(Default)]
pub struct SourceProbe {
    pub acquires: AtomicUsize,
    pub releases: AtomicUsize,
    pub frames: AtomicUsize,
}

pub struct FakeSource {
    probe: Arc<SourceProbe>,
    unavailable: bool,
    not_ready_frames: AtomicU32,
    /// Frames served before the device reports itself unavailable.
    unplug_after: Option<usize>,
    held: bool,
}

impl FakeSource {
    pub fn new() -> (Self, Arc<SourceProbe>) {
        Self::build(false, 0)
    }

    pub fn unavailable() -> (Self, Arc<SourceProbe>) {
        Self::build(true, 0)
    }

    pub fn with_not_ready_frames(count: u32) -> (Self, Arc<SourceProbe>) {
        Self::build(false, count)
    }

    pub fn unplugged_after(frames: usize) -> (Self, Arc<SourceProbe>) {
        let (mut source, probe) = Self::build(false, 0);
        source.unplug_after = Some(frames);
        (source, probe)
    }

    fn build(unavailable: bool, not_ready: u32) -> (Self, Arc<SourceProbe>) {
        let probe = Arc::new(SourceProbe::default());
        let source = Self {
            probe: Arc::clone(&probe),
            unavailable,
            not_ready_frames: AtomicU32::new(not_ready),
            unplug_after: None,
            held: false,
        };
        (source, probe)
    }
}

impl CaptureSource for FakeSource {
    fn acquire(&mut self) -> Result<CaptureSession, CaptureError> {
        if self.unavailable {
            return Err(CaptureError::DeviceUnavailable("permission denied".into()));
        }
        self.probe.acquires.fetch_add(1, Ordering::SeqCst);
        self.held = true;
        Ok(CaptureSession::new(16, 12))
    }

    fn current_frame(&mut self, session: &CaptureSession) -> Result<RawFrame, CaptureError> {
        if !self.held || !session.active {
            return Err(CaptureError::FrameNotReady);
        }
        if self.not_ready_frames.load(Ordering::SeqCst) > 0 {
            self.not_ready_frames.fetch_sub(1, Ordering::SeqCst);
            return Err(CaptureError::FrameNotReady);
        }
        if let Some(limit) = self.unplug_after {
            if self.probe.frames.load(Ordering::SeqCst) >= limit {
                return Err(CaptureError::DeviceUnavailable("unplugged".into()));
            }
        }
        self.probe.frames.fetch_add(1, Ordering::SeqCst);
        Ok(RawFrame::new(RgbImage::from_pixel(16, 12, Rgb([120, 90, 60]))))
    }

    fn release(&mut self, session: &mut CaptureSession) {
        if self.held {
            self.held = false;
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
        }
        session.active = false;
    }
}

/// Answers from a queue, falling back to a neutral non-rewarded result.
/// Optionally blocks on a gate or sleeps to simulate a slow server.
pub struct ScriptedClassifier {
    responses: Mutex<VecDeque<Result<ClassificationResult, ClassificationError>>>,
    gate: Option<Arc<Semaphore>>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl ScriptedClassifier {
    fn build(gate: Option<Arc<Semaphore>>, latency: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(VecDeque::new()),
            gate,
            latency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn immediate() -> Arc<Self> {
        Self::build(None, None)
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Self::build(None, Some(latency))
    }

    /// Every call waits for one permit on the returned semaphore.
    pub fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self::build(Some(Arc::clone(&gate)), None), gate)
    }

    pub fn push(&self, response: Result<ClassificationResult, ClassificationError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        _payload: FramePayload,
    ) -> Result<ClassificationResult, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlightGuard(&self.in_flight);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ClassificationResult::new("neutral", 64.0, RewardStatus::None)))
    }
}

/// Decrements on drop so abandoned calls stop counting as in flight.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
