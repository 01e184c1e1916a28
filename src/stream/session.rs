//! One streaming attempt: verify, connect, pump frames, classify failures.
//!
//! A session is driven as a chain of attempts. Each attempt runs on its own
//! task; a transient failure hands the session context back to the
//! supervisor, which owns the reconnect timer. All buffer mutation and every
//! observer callback for a key happen on the attempt task, so delivery order
//! matches parse order.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::client::{classify_transport, JobsClient, ServiceError, TransportKind};
use crate::roster::JobStage;
use crate::stream::decode::{decode_log_line, decode_metric};
use crate::stream::{
    Frame, FrameParser, LogBuffer, MetricHistory, StreamConfig, StreamKey, StreamKind,
    StreamObserver,
};

/// Where a session currently is in its lifecycle.
///
/// `Completed` and `Failed` are terminal; the supervisor discards the session
/// right after they are signalled, so readers usually observe one of the
/// earlier phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Confirming the job exists before opening any connection
    Verifying,
    /// Opening the event-stream connection
    Connecting,
    /// Delivering decoded events
    Streaming,
    /// Waiting out the delay before another connection attempt
    Retrying,
    /// The stream ended normally
    Completed,
    /// The stream ended with a surfaced error
    Failed,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Verifying => "verifying",
            SessionPhase::Connecting => "connecting",
            SessionPhase::Streaming => "streaming",
            SessionPhase::Retrying => "retrying",
            SessionPhase::Completed => "completed",
            SessionPhase::Failed => "failed",
        }
    }

    /// Whether the session is still working toward a live stream. Retries
    /// deliberately present as "connecting", not as errors.
    pub fn is_establishing(self) -> bool {
        matches!(
            self,
            SessionPhase::Verifying | SessionPhase::Connecting | SessionPhase::Retrying
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-attempt idle timeout that doubles on each transient failure,
/// saturating at the configured cap.
#[derive(Debug, Clone)]
pub(crate) struct RetryState {
    current: Duration,
    max: Duration,
}

impl RetryState {
    pub(crate) fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Timeout applied to the current attempt.
    pub(crate) fn timeout(&self) -> Duration {
        self.current
    }

    /// Double the timeout for the next attempt, returning the new value.
    pub(crate) fn back_off(&mut self) -> Duration {
        self.current = (self.current * 2).min(self.max);
        self.current
    }
}

/// What to do with a session after a connection-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// The job is done; the failure is just the stream winding down.
    Complete,
    /// Startup flakiness; reconnect with a longer timeout.
    Retry,
    /// Surface the error once and discard the session.
    Fail,
}

/// Classify a connection-level failure against the job's freshest known
/// stage and whether this logical stream has delivered anything yet.
///
/// An inactive job takes precedence over everything: its stream ending, no
/// matter how, is a normal completion. A silent gap after data has started
/// flowing is surfaced rather than retried.
pub(crate) fn dispose(error: &ServiceError, stage: JobStage, emitted: u64) -> Disposition {
    if !stage.is_active() {
        return Disposition::Complete;
    }
    if error.is_transient() && emitted == 0 {
        return Disposition::Retry;
    }
    Disposition::Fail
}

/// State readable by the supervisor while the attempt task runs.
pub(crate) struct SessionShared {
    phase: Mutex<SessionPhase>,
    pub(crate) logs: Mutex<LogBuffer>,
    pub(crate) metrics: Mutex<MetricHistory>,
}

impl SessionShared {
    pub(crate) fn new(config: &StreamConfig) -> Self {
        Self {
            phase: Mutex::new(SessionPhase::Verifying),
            logs: Mutex::new(LogBuffer::new(config.log_buffer_lines)),
            metrics: Mutex::new(MetricHistory::new(config.metric_history_samples)),
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        *self.phase.lock().unwrap()
    }

    fn set_phase(&self, phase: SessionPhase) {
        *self.phase.lock().unwrap() = phase;
    }
}

/// Everything one logical stream carries across its connection attempts.
pub(crate) struct SessionContext {
    pub(crate) key: StreamKey,
    pub(crate) client: Arc<JobsClient>,
    pub(crate) config: StreamConfig,
    pub(crate) observer: Arc<dyn StreamObserver>,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) cancel: CancellationToken,
    pub(crate) generation: u64,
    pub(crate) retry: RetryState,
    /// Observer deliveries in this logical stream. Suppressed markers and
    /// deduplicated repeats do not count toward the retry guard.
    pub(crate) emitted: u64,
    pub(crate) last_stage: JobStage,
    pub(crate) verified: bool,
}

/// How one attempt ended, handed back to the supervisor.
pub(crate) enum AttemptEnd {
    /// The observer got its terminal signal; discard the session entry.
    Terminal { key: StreamKey, generation: u64 },
    /// Transient failure; reconnect after `delay` unless the session has
    /// been replaced by then.
    Retry {
        delay: Duration,
        ctx: Box<SessionContext>,
    },
    /// Cancelled; the entry was already removed and nothing is signalled.
    Cancelled,
}

/// Drive a single connection attempt to its end.
pub(crate) async fn run_attempt(mut ctx: SessionContext) -> AttemptEnd {
    // First attempt only: credential short-circuit, then the existence
    // lookup. Reconnects reuse the verified identity.
    if !ctx.verified {
        if let Err(error) = ctx.client.ensure_credentials() {
            return fail(ctx, error);
        }

        ctx.shared.set_phase(SessionPhase::Verifying);
        let snapshot = tokio::select! {
            _ = ctx.cancel.cancelled() => return AttemptEnd::Cancelled,
            result = ctx.client.get_job(&ctx.key.job) => match result {
                Ok(snapshot) => snapshot,
                Err(error) => return fail(ctx, error),
            },
        };
        ctx.last_stage = snapshot.stage;
        ctx.verified = true;

        // A finished job will never produce another sample; complete the
        // metric stream without opening a connection.
        if ctx.key.kind == StreamKind::Metrics && snapshot.stage.is_finished() {
            tracing::debug!(
                key = %ctx.key,
                stage = %snapshot.stage,
                "Job already finished, not opening metric stream"
            );
            return complete(ctx);
        }
    }

    ctx.shared.set_phase(SessionPhase::Connecting);
    let open = tokio::select! {
        _ = ctx.cancel.cancelled() => return AttemptEnd::Cancelled,
        result = tokio::time::timeout(
            ctx.retry.timeout(),
            ctx.client
                .open_stream(&ctx.key.job, ctx.key.kind, ctx.config.resource_timeout()),
        ) => result,
    };
    let response = match open {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => return after_connection_failure(ctx, error).await,
        Err(_) => {
            let timeout = ServiceError::Transport(TransportKind::Timeout);
            return after_connection_failure(ctx, timeout).await;
        }
    };

    ctx.shared.set_phase(SessionPhase::Streaming);
    tracing::debug!(
        key = %ctx.key,
        idle_timeout_secs = ctx.retry.timeout().as_secs(),
        "Stream connected"
    );

    let mut parser = FrameParser::new();
    let mut body = Box::pin(response.bytes_stream());

    loop {
        let next = tokio::select! {
            _ = ctx.cancel.cancelled() => return AttemptEnd::Cancelled,
            next = tokio::time::timeout(ctx.retry.timeout(), body.next()) => next,
        };

        match next {
            // No bytes within the idle window.
            Err(_) => {
                let timeout = ServiceError::Transport(TransportKind::Timeout);
                return after_connection_failure(ctx, timeout).await;
            }
            // Graceful remote close.
            Ok(None) => {
                if parser.pending_len() > 0 {
                    tracing::trace!(
                        key = %ctx.key,
                        pending_bytes = parser.pending_len(),
                        "Discarding unterminated trailing line at stream close"
                    );
                }
                return complete(ctx);
            }
            Ok(Some(Err(error))) => {
                let error = classify_transport(&error);
                return after_connection_failure(ctx, error).await;
            }
            Ok(Some(Ok(chunk))) => {
                for frame in parser.push_chunk(&chunk) {
                    ctx.handle_frame(frame);
                }
            }
        }
    }
}

impl SessionContext {
    fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Data(payload) => self.handle_payload(&payload),
            // Tag lines carry no payload; the data frame that follows is
            // self-describing for a single-kind stream.
            Frame::EventTag(_) => {}
            Frame::KeepAlive => {
                tracing::trace!(key = %self.key, "Keep-alive");
            }
            Frame::Unrecognized(line) => {
                tracing::debug!(key = %self.key, line = %line, "Ignoring unrecognized stream line");
            }
        }
    }

    fn handle_payload(&mut self, payload: &str) {
        metrics::counter!("lookout_frames_total", "kind" => self.key.kind.as_str()).increment(1);

        match self.key.kind {
            StreamKind::Logs => match decode_log_line(payload, self.config.include_timestamps) {
                Ok(Some(line)) => {
                    let fresh = self.shared.logs.lock().unwrap().insert(line.clone());
                    if fresh {
                        self.emitted += 1;
                        self.observer.on_line(&self.key, &line);
                    } else {
                        tracing::trace!(key = %self.key, "Duplicate line suppressed");
                    }
                }
                Ok(None) => {
                    tracing::trace!(key = %self.key, "Stage marker suppressed");
                }
                Err(error) => self.note_decode_failure(&error),
            },
            StreamKind::Metrics => match decode_metric(payload) {
                Ok(sample) => {
                    self.shared.metrics.lock().unwrap().push(sample.clone());
                    self.emitted += 1;
                    self.observer.on_sample(&self.key, &sample);
                }
                Err(error) => self.note_decode_failure(&error),
            },
        }
    }

    /// Malformed frames are diagnostics, never session failures.
    fn note_decode_failure(&self, error: &ServiceError) {
        metrics::counter!("lookout_decode_failures_total", "kind" => self.key.kind.as_str())
            .increment(1);
        tracing::warn!(key = %self.key, error = %error, "Dropping undecodable frame");
    }
}

/// Re-check the job's stage, classify the failure, and either wind down,
/// hand back for a reconnect, or surface the error.
async fn after_connection_failure(mut ctx: SessionContext, error: ServiceError) -> AttemptEnd {
    let stage = tokio::select! {
        _ = ctx.cancel.cancelled() => return AttemptEnd::Cancelled,
        stage = refresh_stage(&ctx) => stage,
    };
    ctx.last_stage = stage;

    match dispose(&error, stage, ctx.emitted) {
        Disposition::Complete => {
            tracing::debug!(
                key = %ctx.key,
                stage = %stage,
                error = %error,
                "Job no longer active, treating stream end as completion"
            );
            complete(ctx)
        }
        Disposition::Retry => {
            let next_timeout = ctx.retry.back_off();
            ctx.shared.set_phase(SessionPhase::Retrying);
            metrics::counter!("lookout_stream_retries_total", "kind" => ctx.key.kind.as_str())
                .increment(1);
            tracing::info!(
                key = %ctx.key,
                next_timeout_secs = next_timeout.as_secs(),
                "Transient stream failure, scheduling reconnect"
            );
            let delay = ctx.config.retry_delay();
            AttemptEnd::Retry {
                delay,
                ctx: Box::new(ctx),
            }
        }
        Disposition::Fail => fail(ctx, error),
    }
}

/// Freshest stage available at failure time: a point lookup, falling back
/// to the cached stage when the lookup itself fails. A job the service no
/// longer knows counts as inactive.
async fn refresh_stage(ctx: &SessionContext) -> JobStage {
    match ctx.client.get_job(&ctx.key.job).await {
        Ok(snapshot) => snapshot.stage,
        Err(ServiceError::JobNotFound(_)) => JobStage::Unknown,
        Err(error) => {
            tracing::debug!(
                key = %ctx.key,
                error = %error,
                "Stage re-check failed, using last known stage"
            );
            ctx.last_stage
        }
    }
}

fn complete(ctx: SessionContext) -> AttemptEnd {
    if ctx.cancel.is_cancelled() {
        return AttemptEnd::Cancelled;
    }
    ctx.shared.set_phase(SessionPhase::Completed);
    tracing::debug!(key = %ctx.key, emitted = ctx.emitted, "Stream complete");
    ctx.observer.on_complete(&ctx.key);
    AttemptEnd::Terminal {
        key: ctx.key,
        generation: ctx.generation,
    }
}

fn fail(ctx: SessionContext, error: ServiceError) -> AttemptEnd {
    if ctx.cancel.is_cancelled() {
        return AttemptEnd::Cancelled;
    }
    ctx.shared.set_phase(SessionPhase::Failed);
    tracing::warn!(key = %ctx.key, error = %error, "Stream failed");
    ctx.observer.on_error(&ctx.key, &error);
    AttemptEnd::Terminal {
        key: ctx.key,
        generation: ctx.generation,
    }
}
