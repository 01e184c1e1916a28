//! Shared test utilities for lookout integration tests.
//!
//! Provides config builders pointed at a wiremock server, wire-shaped
//! payload builders for jobs and stream frames, and a collecting observer
//! with polling wait helpers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lookout::client::{JobsClient, ServiceError};
use lookout::config::ServiceConfig;
use lookout::stream::{
    LogLine, MetricSample, StreamConfig, StreamKey, StreamObserver, StreamSupervisor,
};
use wiremock::ResponseTemplate;

// =============================================================================
// Well-Known Test Constants
// =============================================================================

/// User every test config authenticates as.
pub const TEST_USER: &str = "alice";

/// Bearer token baked into test configs.
pub const TEST_TOKEN: &str = "test-token";

// =============================================================================
// Config Builders
// =============================================================================

/// Service config pointed at a mock server, with the token carried in the
/// config so nothing resolves from the host environment.
pub fn make_service_config(base_url: &str) -> ServiceConfig {
    ServiceConfig {
        base_url: base_url.to_string(),
        user: TEST_USER.to_string(),
        token: Some(TEST_TOKEN.to_string()),
        token_env: "LOOKOUT_TEST_UNSET_TOKEN".to_string(),
        ..ServiceConfig::default()
    }
}

/// Stream config with test-scale timings: a one-second idle window and a
/// short reconnect delay so retry paths finish quickly.
pub fn make_stream_config() -> StreamConfig {
    StreamConfig {
        idle_timeout_seconds: 1,
        max_idle_timeout_seconds: 4,
        retry_delay_ms: 50,
        ..StreamConfig::default()
    }
}

/// Supervisor wired to a mock server.
pub fn make_supervisor(base_url: &str) -> StreamSupervisor {
    let client = JobsClient::new(&make_service_config(base_url)).unwrap();
    StreamSupervisor::new(Arc::new(client), make_stream_config())
}

// =============================================================================
// Wire Payload Builders
// =============================================================================

/// JSON body for one job as the list and lookup endpoints return it.
pub fn job_json(id: &str, display_name: &str, stage: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "displayName": display_name,
        "stage": stage,
        "message": "",
        "createdAt": "2025-03-14T09:00:00Z",
        "spec": {}
    })
}

/// One SSE data frame carrying a log payload.
pub fn log_frame(timestamp: &str, message: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({ "timestamp": timestamp, "data": message })
    )
}

/// One SSE data frame carrying a metric sample.
pub fn metric_frame(cpu_pct: f64, mem_used: u64, mem_total: u64) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({
            "cpuPct": cpu_pct,
            "memUsedBytes": mem_used,
            "memTotalBytes": mem_total,
        })
    )
}

/// SSE comment line the service sends as a keep-alive.
pub fn keep_alive() -> String {
    ": keep-alive\n".to_string()
}

/// Stage-marker line the service injects at job start. Never displayed.
pub fn stage_marker() -> String {
    "data: {\"data\":\"===== Job started at 2025-03-14 09:00:00 =====\"}\n\n".to_string()
}

/// 200 response carrying an event-stream body.
pub fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/event-stream")
}

// =============================================================================
// Wait Helpers
// =============================================================================

/// Poll until `done` returns true or the timeout elapses.
pub async fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// Collecting Observer
// =============================================================================

/// Observer that records every delivery for later assertion.
pub struct CollectingObserver {
    pub lines: Mutex<Vec<LogLine>>,
    pub samples: Mutex<Vec<MetricSample>>,
    pub errors: Mutex<Vec<ServiceError>>,
    pub completions: Mutex<Vec<StreamKey>>,
}

impl CollectingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(Vec::new()),
            samples: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            completions: Mutex::new(Vec::new()),
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .map(|line| line.message.clone())
            .collect()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    pub fn first_error(&self) -> Option<ServiceError> {
        self.errors.lock().unwrap().first().cloned()
    }

    fn is_terminal(&self) -> bool {
        self.error_count() + self.completion_count() > 0
    }

    /// Poll until the session has signalled `on_error` or `on_complete`.
    pub async fn wait_for_terminal(&self, timeout: Duration) -> bool {
        wait_until(timeout, || self.is_terminal()).await
    }
}

impl StreamObserver for CollectingObserver {
    fn on_line(&self, _key: &StreamKey, line: &LogLine) {
        self.lines.lock().unwrap().push(line.clone());
    }

    fn on_sample(&self, _key: &StreamKey, sample: &MetricSample) {
        self.samples.lock().unwrap().push(sample.clone());
    }

    fn on_error(&self, _key: &StreamKey, error: &ServiceError) {
        self.errors.lock().unwrap().push(error.clone());
    }

    fn on_complete(&self, key: &StreamKey) {
        self.completions.lock().unwrap().push(key.clone());
    }
}
