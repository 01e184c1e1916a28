//! Configuration for streaming sessions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for live log and metric streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Seconds without a byte before a connection attempt is abandoned
    pub idle_timeout_seconds: u64,
    /// Ceiling the idle timeout doubles toward across retries
    pub max_idle_timeout_seconds: u64,
    /// Overall lifetime cap on a single stream connection
    pub resource_timeout_seconds: u64,
    /// Pause before reconnecting after a transient failure
    pub retry_delay_ms: u64,
    /// Log lines retained per stream for replay
    pub log_buffer_lines: usize,
    /// Metric samples retained per stream
    pub metric_history_samples: usize,
    /// Whether to parse and display server timestamps on log lines
    pub include_timestamps: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: 10,
            max_idle_timeout_seconds: 60,
            resource_timeout_seconds: 3600,
            retry_delay_ms: 500,
            log_buffer_lines: 1000,
            metric_history_samples: 60,
            include_timestamps: true,
        }
    }
}

impl StreamConfig {
    pub fn initial_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_secs(self.max_idle_timeout_seconds)
    }

    pub fn resource_timeout(&self) -> Duration {
        Duration::from_secs(self.resource_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
