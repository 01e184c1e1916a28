//! Supervised event-stream ingestion for live job logs and metrics.
//!
//! This module owns the full streaming pipeline: incremental frame parsing
//! ([`FrameParser`]), payload decoding into [`LogLine`] / [`MetricSample`],
//! bounded replay buffering with duplicate suppression, and the
//! [`StreamSupervisor`] that runs one supervised session per
//! (job, stream-kind) key with state-aware retry.

mod buffer;
mod config;
mod decode;
mod event;
mod frame;
mod session;

pub use buffer::{LogBuffer, MetricHistory};
pub use config::StreamConfig;
pub use event::{GpuSample, LogLine, MetricSample};
pub use frame::{Frame, FrameParser};
pub use session::SessionPhase;

pub(crate) use decode::LogPayload;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::client::{JobsClient, ServiceError};
use crate::roster::{JobId, JobStage};
use session::{AttemptEnd, RetryState, SessionContext, SessionShared};

/// Which telemetry stream of a job a session follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Logs,
    Metrics,
}

impl StreamKind {
    /// Endpoint path segment for the live stream.
    pub fn stream_path(self) -> &'static str {
        match self {
            StreamKind::Logs => "logs-stream",
            StreamKind::Metrics => "metrics-stream",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Logs => "logs",
            StreamKind::Metrics => "metrics",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of streaming exclusivity: at most one live session exists per
/// (job, kind) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub job: JobId,
    pub kind: StreamKind,
}

impl StreamKey {
    pub fn new(job: JobId, kind: StreamKind) -> Self {
        Self { job, kind }
    }

    pub fn logs(job: JobId) -> Self {
        Self::new(job, StreamKind::Logs)
    }

    pub fn metrics(job: JobId) -> Self {
        Self::new(job, StreamKind::Metrics)
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.job, self.kind)
    }
}

/// Receiver for decoded stream events and the session's terminal signal.
///
/// For one key, callbacks arrive serialized and in parse order, from the
/// session's own task. A session signals `on_error` or `on_complete` at
/// most once; a cancelled session signals nothing further.
pub trait StreamObserver: Send + Sync {
    /// A fresh (non-duplicate, non-marker) log line.
    fn on_line(&self, _key: &StreamKey, _line: &LogLine) {}

    /// A decoded metric sample; always supersedes the previous one.
    fn on_sample(&self, _key: &StreamKey, _sample: &MetricSample) {}

    /// The session failed; already terminal when delivered.
    fn on_error(&self, key: &StreamKey, error: &ServiceError);

    /// The stream ended normally; already terminal when delivered.
    fn on_complete(&self, key: &StreamKey);
}

/// Result of asking the supervisor to start a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A session now owns the key and its first attempt is running.
    Started,
    /// The key already has a live session, which was left untouched.
    AlreadyStreaming,
}

impl StartOutcome {
    pub fn is_started(self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

impl std::fmt::Display for StartOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartOutcome::Started => f.write_str("started"),
            StartOutcome::AlreadyStreaming => f.write_str("already streaming"),
        }
    }
}

struct SessionEntry {
    generation: u64,
    cancel: CancellationToken,
    shared: Arc<SessionShared>,
}

/// Lifecycle manager for stream sessions.
///
/// Enforces at-most-one-active-session-per-key, owns the reconnect timers,
/// and exposes the per-session replay state. Cheap to clone; clones share
/// the same session table.
#[derive(Clone)]
pub struct StreamSupervisor {
    inner: Arc<SupervisorInner>,
}

pub(crate) struct SupervisorInner {
    client: Arc<JobsClient>,
    config: StreamConfig,
    sessions: DashMap<StreamKey, SessionEntry>,
    /// Monotonic id handed to each new session; retry timers compare it at
    /// fire time so a timer from a torn-down session never acts.
    next_generation: AtomicU64,
}

impl StreamSupervisor {
    pub fn new(client: Arc<JobsClient>, config: StreamConfig) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                client,
                config,
                sessions: DashMap::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Start a session for (job, kind), delivering events to `observer`.
    ///
    /// A key that is already streaming is left untouched and the call
    /// reports [`StartOutcome::AlreadyStreaming`]. Credential and
    /// verification failures are surfaced through the observer, not here.
    pub fn start(
        &self,
        job: JobId,
        kind: StreamKind,
        observer: Arc<dyn StreamObserver>,
    ) -> StartOutcome {
        let key = StreamKey::new(job, kind);

        let slot = match self.inner.sessions.entry(key.clone()) {
            Entry::Occupied(_) => {
                tracing::debug!(key = %key, "Start ignored, key is already streaming");
                return StartOutcome::AlreadyStreaming;
            }
            Entry::Vacant(slot) => slot,
        };

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let shared = Arc::new(SessionShared::new(&self.inner.config));
        slot.insert(SessionEntry {
            generation,
            cancel: cancel.clone(),
            shared: Arc::clone(&shared),
        });

        let ctx = SessionContext {
            key: key.clone(),
            client: Arc::clone(&self.inner.client),
            config: self.inner.config.clone(),
            observer,
            shared,
            cancel,
            generation,
            retry: RetryState::new(
                self.inner.config.initial_timeout(),
                self.inner.config.max_timeout(),
            ),
            emitted: 0,
            last_stage: JobStage::Unknown,
            verified: false,
        };

        tracing::info!(key = %key, generation, "Stream session started");
        self.inner.spawn_attempt(ctx);
        StartOutcome::Started
    }

    /// Tear down the session for a key, if one exists.
    ///
    /// Idempotent and valid in any state: the connection is dropped, any
    /// scheduled reconnect is suppressed, and no further observer callbacks
    /// are delivered. Returns whether a session was actually torn down.
    pub fn cancel(&self, key: &StreamKey) -> bool {
        match self.inner.sessions.remove(key) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                tracing::info!(key = %key, generation = entry.generation, "Stream session cancelled");
                true
            }
            None => {
                tracing::debug!(key = %key, "Cancel on idle key is a no-op");
                false
            }
        }
    }

    /// Tear down every live session.
    pub fn cancel_all(&self) {
        let keys: Vec<StreamKey> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    /// Whether a session currently owns the key.
    pub fn is_active(&self, key: &StreamKey) -> bool {
        self.inner.sessions.contains_key(key)
    }

    /// Keys with a live session, in no particular order.
    pub fn active_keys(&self) -> Vec<StreamKey> {
        self.inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Current lifecycle phase of a key's session.
    pub fn phase(&self, key: &StreamKey) -> Option<SessionPhase> {
        self.inner
            .sessions
            .get(key)
            .map(|entry| entry.shared.phase())
    }

    /// Buffered log lines for replay, oldest first.
    pub fn log_replay(&self, key: &StreamKey) -> Option<Vec<LogLine>> {
        self.inner
            .sessions
            .get(key)
            .map(|entry| entry.shared.logs.lock().unwrap().snapshot())
    }

    /// Retained metric samples, oldest first.
    pub fn metric_history(&self, key: &StreamKey) -> Option<Vec<MetricSample>> {
        self.inner
            .sessions
            .get(key)
            .map(|entry| entry.shared.metrics.lock().unwrap().snapshot())
    }

    /// Most recent metric sample, if any arrived yet.
    pub fn latest_sample(&self, key: &StreamKey) -> Option<MetricSample> {
        self.inner
            .sessions
            .get(key)
            .and_then(|entry| entry.shared.metrics.lock().unwrap().latest().cloned())
    }
}

impl SupervisorInner {
    fn spawn_attempt(self: &Arc<Self>, ctx: SessionContext) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            match session::run_attempt(ctx).await {
                AttemptEnd::Terminal { key, generation } => inner.discard(&key, generation),
                AttemptEnd::Retry { delay, ctx } => inner.schedule_retry(delay, *ctx),
                AttemptEnd::Cancelled => {}
            }
        });
    }

    /// Supervised reconnect timer. At fire time the timer acts only if the
    /// key still belongs to the generation that scheduled it.
    fn schedule_retry(self: &Arc<Self>, delay: Duration, ctx: SessionContext) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if !inner.is_current(&ctx.key, ctx.generation) {
                tracing::debug!(
                    key = %ctx.key,
                    generation = ctx.generation,
                    "Dropping stale retry timer"
                );
                return;
            }
            inner.spawn_attempt(ctx);
        });
    }

    fn is_current(&self, key: &StreamKey, generation: u64) -> bool {
        self.sessions.get(key).map(|entry| entry.generation) == Some(generation)
    }

    /// Drop a terminal session's entry, unless a newer session already took
    /// the key.
    fn discard(&self, key: &StreamKey, generation: u64) {
        self.sessions
            .remove_if(key, |_, entry| entry.generation == generation);
    }
}
