//! Roster polling configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Roster polling cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between roster polls.
    pub interval_seconds: u64,
    /// Poll at the faster auto-refresh cadence instead of the base one.
    pub auto_refresh: bool,
    /// Seconds between polls when auto-refresh is on.
    pub auto_refresh_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            auto_refresh: false,
            auto_refresh_seconds: 5,
        }
    }
}

impl PollConfig {
    /// Cadence in effect given the auto-refresh toggle.
    pub fn effective_interval(&self) -> Duration {
        if self.auto_refresh {
            Duration::from_secs(self.auto_refresh_seconds)
        } else {
            Duration::from_secs(self.interval_seconds)
        }
    }
}
