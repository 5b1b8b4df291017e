pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::FramePayload;

pub use http::HttpClassifier;

/// Label projected when a classification attempt fails.
pub const ERROR_LABEL: &str = "Error";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RewardStatus {
    #[default]
    None,
    /// Accumulated server side (collection mode).
    Collected,
    /// Dispatched to the user's wallet.
    Sent,
}

impl RewardStatus {
    /// Unknown or missing values never count as a reward.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("collected") => RewardStatus::Collected,
            Some("sent") => RewardStatus::Sent,
            _ => RewardStatus::None,
        }
    }

    pub fn is_reward(self) -> bool {
        matches!(self, RewardStatus::Collected | RewardStatus::Sent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub emotion: String,
    /// Percentage in `0.0..=100.0`.
    pub confidence: f64,
    pub reward_status: RewardStatus,
}

impl ClassificationResult {
    pub fn new(emotion: impl Into<String>, confidence: f64, reward_status: RewardStatus) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            emotion: emotion.into(),
            confidence,
            reward_status,
        }
    }

    /// Stand-in result for a failed attempt.
    pub fn error() -> Self {
        Self::new(ERROR_LABEL, 0.0, RewardStatus::None)
    }

    pub fn is_rewarded(&self) -> bool {
        self.reward_status.is_reward()
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    #[error("classification request failed: {0}")]
    Transport(String),

    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("classifier response could not be decoded: {0}")]
    Decode(String),

    #[error("classification timed out after {0:?}")]
    Timeout(Duration),
}

/// Remote emotion classifier. One call is one round trip; callers own any
/// retry policy.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        payload: FramePayload,
    ) -> Result<ClassificationResult, ClassificationError>;
}
