//! Job identity and snapshot types shared across the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a remote job, stable for the job's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Lifecycle stage reported by the job service.
///
/// `Running` and `Updating` are the only stages for which streaming is
/// meaningful; everything else ends or defers telemetry. Stage strings not
/// recognized by this client map to `Unknown` rather than failing the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStage {
    Pending,
    Queued,
    Running,
    Updating,
    Completed,
    Error,
    #[serde(other)]
    #[default]
    Unknown,
}

impl JobStage {
    /// Whether the job is actively producing telemetry.
    pub fn is_active(self) -> bool {
        matches!(self, JobStage::Running | JobStage::Updating)
    }

    /// Whether the job has finished (successfully or not).
    pub fn is_finished(self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStage::Pending => "PENDING",
            JobStage::Queued => "QUEUED",
            JobStage::Running => "RUNNING",
            JobStage::Updating => "UPDATING",
            JobStage::Completed => "COMPLETED",
            JobStage::Error => "ERROR",
            JobStage::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view of one job as returned by the list and lookup endpoints.
///
/// Replaced wholesale on every roster poll; the previous snapshot is retained
/// only long enough to compute a [`RosterDiff`](crate::roster::RosterDiff).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub stage: JobStage,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Submitted job spec, carried opaquely for display purposes.
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl JobSnapshot {
    /// Human-facing name, falling back to the id when the service sent none.
    pub fn title(&self) -> &str {
        if self.display_name.is_empty() {
            self.id.as_str()
        } else {
            &self.display_name
        }
    }
}
