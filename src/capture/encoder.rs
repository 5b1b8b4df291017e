use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use image::{codecs::jpeg::JpegEncoder, imageops};
use thiserror::Error;

use super::RawFrame;

pub const DEFAULT_JPEG_QUALITY: u8 = 70;
pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame has zero area")]
    EmptyFrame,

    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// One encoded still, ready for a single classification request.
#[derive(Debug, Clone)]
pub struct FramePayload {
    /// `data:image/jpeg;base64,...`, sent verbatim as the request's `image`.
    pub data_url: String,
    /// Size of the JPEG before base64.
    pub byte_len: usize,
    pub captured_at: DateTime<Utc>,
    /// Always true: the classifier receives the self-view orientation.
    pub mirrored: bool,
}

impl FramePayload {
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let encoded = self
            .data_url
            .strip_prefix(JPEG_DATA_URL_PREFIX)
            .unwrap_or(&self.data_url);
        STANDARD.decode(encoded)
    }
}

/// Mirrors a frame horizontally and encodes it as a base64 JPEG data URL.
///
/// The preview shown to the user is mirrored so it behaves like a mirror; the
/// classifier is trained on that same self-view orientation, so the wire image
/// is flipped to match what the user sees.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&self, frame: &RawFrame) -> Result<FramePayload, EncodeError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(EncodeError::EmptyFrame);
        }

        let mirrored = imageops::flip_horizontal(&frame.image);

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(&mirrored)?;

        let data_url = format!("{JPEG_DATA_URL_PREFIX}{}", STANDARD.encode(&jpeg));

        Ok(FramePayload {
            data_url,
            byte_len: jpeg.len(),
            captured_at: frame.captured_at,
            mirrored: true,
        })
    }
}
