use std::path::PathBuf;

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use rand::Rng;

use super::{
    CaptureError, CaptureSession, CaptureSource, RawFrame, TARGET_FRAME_HEIGHT, TARGET_FRAME_WIDTH,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

enum FrameOrigin {
    File(PathBuf),
    Image(RgbImage),
    Synthetic,
}

/// Serves a single still image as if it were a live camera stream.
///
/// Used for headless runs and kiosks without a webcam. Opening the "device"
/// loads and scales the image; a missing or undecodable file reports
/// `DeviceUnavailable` exactly like a camera permission failure would.
pub struct StillImageSource {
    origin: FrameOrigin,
    width: u32,
    height: u32,
    warmup_frames: u32,
    warmup_remaining: u32,
    frame: Option<RgbImage>,
}

impl StillImageSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_origin(FrameOrigin::File(path.into()))
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self::with_origin(FrameOrigin::Image(image))
    }

    /// Gradient with per-pixel noise, regenerated on every acquire.
    pub fn synthetic() -> Self {
        Self::with_origin(FrameOrigin::Synthetic)
    }

    fn with_origin(origin: FrameOrigin) -> Self {
        Self {
            origin,
            width: TARGET_FRAME_WIDTH,
            height: TARGET_FRAME_HEIGHT,
            warmup_frames: 0,
            warmup_remaining: 0,
            frame: None,
        }
    }

    /// Number of frame requests answered with `FrameNotReady` right after
    /// acquire, the way a real stream has no frame until its metadata loads.
    pub fn with_warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    fn load_frame(&self) -> Result<RgbImage, CaptureError> {
        if self.width == 0 || self.height == 0 {
            return Err(CaptureError::DeviceUnavailable(format!(
                "invalid capture resolution {}x{}",
                self.width, self.height
            )));
        }

        let image = match &self.origin {
            FrameOrigin::File(path) => image::open(path)
                .map_err(|err| {
                    CaptureError::DeviceUnavailable(format!(
                        "failed to open {}: {err}",
                        path.display()
                    ))
                })?
                .to_rgb8(),
            FrameOrigin::Image(image) => image.clone(),
            FrameOrigin::Synthetic => synthetic_frame(self.width, self.height),
        };

        if image.dimensions() == (self.width, self.height) {
            Ok(image)
        } else {
            Ok(imageops::resize(
                &image,
                self.width,
                self.height,
                FilterType::Triangle,
            ))
        }
    }
}

impl CaptureSource for StillImageSource {
    fn acquire(&mut self) -> Result<CaptureSession, CaptureError> {
        let frame = self.load_frame()?;
        self.frame = Some(frame);
        self.warmup_remaining = self.warmup_frames;

        let session = CaptureSession::new(self.width, self.height);
        log_info!(
            "still image source opened ({}x{}, warmup {} frames)",
            self.width,
            self.height,
            self.warmup_frames
        );
        Ok(session)
    }

    fn current_frame(&mut self, session: &CaptureSession) -> Result<RawFrame, CaptureError> {
        if !session.active {
            return Err(CaptureError::FrameNotReady);
        }
        let Some(frame) = self.frame.as_ref() else {
            return Err(CaptureError::FrameNotReady);
        };

        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Err(CaptureError::FrameNotReady);
        }

        Ok(RawFrame::new(frame.clone()))
    }

    fn release(&mut self, session: &mut CaptureSession) {
        if self.frame.take().is_some() {
            log_debug!("still image source closed for session {}", session.id);
        }
        session.active = false;
    }
}

fn synthetic_frame(width: u32, height: u32) -> RgbImage {
    let mut rng = rand::thread_rng();
    RgbImage::from_fn(width, height, |x, y| {
        let noise: u8 = rng.gen_range(0..24);
        let red = ((x * 255) / width.max(1)) as u8;
        let green = ((y * 255) / height.max(1)) as u8;
        Rgb([red.saturating_add(noise), green, 96u8.saturating_add(noise)])
    })
}
