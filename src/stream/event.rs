//! Decoded telemetry events delivered to observers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One log line from a job, with the server timestamp when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
}

impl LogLine {
    /// Render the line the way it is shown and deduplicated: a bracketed
    /// second-resolution timestamp prefix when one exists, bare otherwise.
    pub fn display_line(&self) -> String {
        match self.timestamp {
            Some(ts) => format!("[{}] {}", ts.format("%Y-%m-%d %H:%M:%S"), self.message),
            None => self.message.clone(),
        }
    }
}

/// A point-in-time resource sample for one replica of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    #[serde(default)]
    pub cpu_pct: f64,
    #[serde(default)]
    pub cpu_millicores: f64,
    #[serde(default)]
    pub mem_used_bytes: u64,
    #[serde(default)]
    pub mem_total_bytes: u64,
    #[serde(default)]
    pub rx_bps: f64,
    #[serde(default)]
    pub tx_bps: f64,
    #[serde(default)]
    pub gpus: HashMap<String, GpuSample>,
    #[serde(default)]
    pub replica_id: Option<String>,
    /// Stamped on arrival; the wire format carries no client-side clock.
    #[serde(skip_deserializing, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

/// Per-GPU utilization within a [`MetricSample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuSample {
    #[serde(default)]
    pub utilization_pct: f64,
    #[serde(default)]
    pub memory_utilization_pct: f64,
    #[serde(default)]
    pub mem_used_bytes: u64,
    #[serde(default)]
    pub mem_total_bytes: u64,
    #[serde(default)]
    pub temperature_c: f64,
}

impl MetricSample {
    /// Memory usage as a fraction of the total, `None` when the total is
    /// unknown or zero.
    pub fn mem_fraction(&self) -> Option<f64> {
        if self.mem_total_bytes == 0 {
            return None;
        }
        Some(self.mem_used_bytes as f64 / self.mem_total_bytes as f64)
    }
}
