//! Camera-side plumbing: the exclusive capture stream and the scope guard that
//! guarantees it is handed back.

pub mod encoder;
pub mod still;

use chrono::{DateTime, Utc};
use image::RgbImage;
use thiserror::Error;
use uuid::Uuid;

pub use encoder::{EncodeError, FrameEncoder, FramePayload, DEFAULT_JPEG_QUALITY};
pub use still::StillImageSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub const TARGET_FRAME_WIDTH: u32 = 640;
pub const TARGET_FRAME_HEIGHT: u32 = 480;

#[derive(Debug, Error)]
pub enum CaptureError {
    /// Permission denied, hardware missing, or the stream could not be opened.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The stream is open but has no frame to hand out yet.
    #[error("frame not ready")]
    FrameNotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSession {
    pub id: String,
    pub active: bool,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl CaptureSession {
    pub fn new(frame_width: u32, frame_height: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            active: true,
            frame_width,
            frame_height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawFrame {
    pub image: RgbImage,
    pub captured_at: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A video input that can be held by exactly one sampler at a time.
///
/// `release` must tolerate being called more than once and must be called on
/// every exit path; [`ActiveCapture`] takes care of the latter.
pub trait CaptureSource: Send {
    fn acquire(&mut self) -> Result<CaptureSession, CaptureError>;

    fn current_frame(&mut self, session: &CaptureSession) -> Result<RawFrame, CaptureError>;

    fn release(&mut self, session: &mut CaptureSession);
}

/// Owns an acquired source for the lifetime of one scanning session and
/// releases it on drop.
pub struct ActiveCapture {
    source: Box<dyn CaptureSource>,
    session: CaptureSession,
}

impl ActiveCapture {
    pub fn acquire(mut source: Box<dyn CaptureSource>) -> Result<Self, CaptureError> {
        let session = source.acquire()?;
        log_debug!(
            "capture session {} acquired ({}x{})",
            session.id,
            session.frame_width,
            session.frame_height
        );
        Ok(Self { source, session })
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn current_frame(&mut self) -> Result<RawFrame, CaptureError> {
        if !self.session.active {
            return Err(CaptureError::FrameNotReady);
        }
        self.source.current_frame(&self.session)
    }

    pub fn release(&mut self) {
        if !self.session.active {
            return;
        }
        self.source.release(&mut self.session);
        self.session.active = false;
        log_debug!("capture session {} released", self.session.id);
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.release();
    }
}
