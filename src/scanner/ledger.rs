use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::classify::ClassificationResult;

pub const DEFAULT_REWARD_PULSE: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardSnapshot {
    pub session_count: u64,
    pub pulse_active: bool,
}

/// Rewards earned during one capture session.
///
/// The count only grows. A qualifying result starts (or restarts) the pulse;
/// the pulse ends at its deadline no matter what later results say.
#[derive(Debug, Clone)]
pub struct RewardLedger {
    session_count: u64,
    pulse_duration: Duration,
    pulse_until: Option<Instant>,
    /// Minimum spacing between counted rewards. `None` counts every one.
    cooldown: Option<Duration>,
    last_counted_at: Option<Instant>,
}

impl Default for RewardLedger {
    fn default() -> Self {
        Self::new(DEFAULT_REWARD_PULSE)
    }
}

impl RewardLedger {
    pub fn new(pulse_duration: Duration) -> Self {
        Self {
            session_count: 0,
            pulse_duration,
            pulse_until: None,
            cooldown: None,
            last_counted_at: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.cooldown = cooldown.filter(|c| !c.is_zero());
        self
    }

    /// Returns true when the result was counted.
    pub fn record_if_rewarded(&mut self, result: &ClassificationResult, now: Instant) -> bool {
        if !result.is_rewarded() {
            return false;
        }

        if let (Some(cooldown), Some(last)) = (self.cooldown, self.last_counted_at) {
            if now.saturating_duration_since(last) < cooldown {
                return false;
            }
        }

        self.session_count = self.session_count.saturating_add(1);
        self.last_counted_at = Some(now);
        self.pulse_until = Some(now + self.pulse_duration);
        true
    }

    /// Clears the pulse once its deadline has passed. Returns true if it did.
    pub fn expire_pulse(&mut self, now: Instant) -> bool {
        match self.pulse_until {
            Some(until) if now >= until => {
                self.pulse_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn pulse_deadline(&self) -> Option<Instant> {
        self.pulse_until
    }

    pub fn pulse_active(&self) -> bool {
        self.pulse_until.is_some()
    }

    pub fn session_count(&self) -> u64 {
        self.session_count
    }

    pub fn snapshot(&self) -> RewardSnapshot {
        RewardSnapshot {
            session_count: self.session_count,
            pulse_active: self.pulse_active(),
        }
    }
}
