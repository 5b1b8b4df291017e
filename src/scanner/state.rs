use serde::{Deserialize, Serialize};

use super::ledger::RewardSnapshot;
use super::projector::DisplayState;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SamplerStatus {
    #[default]
    Idle,
    Initializing,
    Ready,
    Error,
    Stopped,
}

impl SamplerStatus {
    /// Persistent banner text for states that have one.
    pub fn status_message(self) -> Option<&'static str> {
        match self {
            SamplerStatus::Initializing => Some("Starting camera..."),
            SamplerStatus::Error => Some("Could not access camera."),
            SamplerStatus::Idle | SamplerStatus::Ready | SamplerStatus::Stopped => None,
        }
    }
}

/// Everything the presentation layer may read about a scanner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSnapshot {
    pub session_id: Option<String>,
    pub status: SamplerStatus,
    pub status_message: Option<String>,
    pub in_flight: bool,
    pub display: DisplayState,
    pub rewards: RewardSnapshot,
}

impl ScannerSnapshot {
    pub fn initializing() -> Self {
        let mut snapshot = Self::default();
        snapshot.set_status(SamplerStatus::Initializing);
        snapshot
    }

    pub fn set_status(&mut self, status: SamplerStatus) {
        self.status = status;
        self.status_message = status.status_message().map(str::to_string);
    }
}
