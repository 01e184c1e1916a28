//! JSON payload decoding for data frames.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::client::ServiceError;
use crate::stream::{LogLine, MetricSample};

/// Lines the service injects to mark stage transitions rather than real
/// job output. Suppressed from display and buffers.
const STAGE_MARKER_PREFIX: &str = "===== Job started";

/// Wire shape of one log payload.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LogPayload {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub data: String,
}

impl LogPayload {
    /// Convert to a displayable line, dropping stage markers.
    ///
    /// Timestamps that fail to parse are treated as absent rather than
    /// failing the whole line.
    pub(crate) fn into_line(self, include_timestamps: bool) -> Option<LogLine> {
        if self.data.starts_with(STAGE_MARKER_PREFIX) {
            return None;
        }
        let timestamp = if include_timestamps {
            self.timestamp.as_deref().and_then(parse_timestamp)
        } else {
            None
        };
        Some(LogLine {
            timestamp,
            message: self.data,
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

/// Decode a log data payload. `Ok(None)` means a valid but suppressed
/// marker line; `Err` means the payload was not valid JSON.
pub(crate) fn decode_log_line(
    payload: &str,
    include_timestamps: bool,
) -> Result<Option<LogLine>, ServiceError> {
    let parsed: LogPayload =
        serde_json::from_str(payload).map_err(|e| ServiceError::Decode(e.to_string()))?;
    Ok(parsed.into_line(include_timestamps))
}

/// Decode a metric data payload, stamping the arrival time.
pub(crate) fn decode_metric(payload: &str) -> Result<MetricSample, ServiceError> {
    serde_json::from_str(payload).map_err(|e| ServiceError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_log_line_with_timestamp() {
        let line = decode_log_line(
            r#"{"timestamp":"2025-03-14T09:26:53Z","data":"epoch 3 done"}"#,
            true,
        )
        .unwrap()
        .unwrap();
        assert_eq!(line.message, "epoch 3 done");
        assert_eq!(line.display_line(), "[2025-03-14 09:26:53] epoch 3 done");
    }

    #[test]
    fn test_decode_log_line_timestamps_disabled() {
        let line = decode_log_line(
            r#"{"timestamp":"2025-03-14T09:26:53Z","data":"epoch 3 done"}"#,
            false,
        )
        .unwrap()
        .unwrap();
        assert!(line.timestamp.is_none());
        assert_eq!(line.display_line(), "epoch 3 done");
    }

    #[test]
    fn test_decode_log_line_missing_timestamp() {
        let line = decode_log_line(r#"{"data":"no clock"}"#, true)
            .unwrap()
            .unwrap();
        assert!(line.timestamp.is_none());
    }

    #[test]
    fn test_decode_log_line_unparseable_timestamp_is_lenient() {
        let line = decode_log_line(r#"{"timestamp":"yesterday-ish","data":"x"}"#, true)
            .unwrap()
            .unwrap();
        assert!(line.timestamp.is_none());
        assert_eq!(line.message, "x");
    }

    #[test]
    fn test_decode_log_line_suppresses_stage_marker() {
        let result = decode_log_line(
            r#"{"data":"===== Job started at 2025-03-14 09:26:53 ====="}"#,
            true,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_log_line_marker_must_be_prefix() {
        let line = decode_log_line(r#"{"data":"note: ===== Job started ====="}"#, true)
            .unwrap()
            .unwrap();
        assert_eq!(line.message, "note: ===== Job started =====");
    }

    #[test]
    fn test_decode_log_line_invalid_json() {
        let err = decode_log_line("not json", true).unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
    }

    #[test]
    fn test_decode_metric() {
        let sample = decode_metric(r#"{"cpuPct":12.0,"memUsedBytes":1024}"#).unwrap();
        assert_eq!(sample.cpu_pct, 12.0);
        assert_eq!(sample.mem_used_bytes, 1024);
    }

    #[test]
    fn test_decode_metric_invalid_json() {
        let err = decode_metric("{cpu}").unwrap_err();
        assert!(matches!(err, ServiceError::Decode(_)));
    }
}
