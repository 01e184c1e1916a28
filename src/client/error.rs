//! Error types for the job-service client and stream sessions.

use crate::roster::JobId;
use thiserror::Error;

/// Errors produced by the job service client and surfaced to stream observers.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// No bearer token or no user identity is configured.
    #[error("no credential available for the job service")]
    MissingCredential,

    /// The service URL could not be constructed.
    #[error("invalid service endpoint: {0}")]
    InvalidEndpoint(String),

    /// Point lookup returned 404.
    #[error("job not found: {0}")]
    JobNotFound(JobId),

    /// Non-success initial HTTP response.
    #[error("service returned HTTP {0}")]
    HttpStatus(u16),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(TransportKind),

    /// Malformed payload on an individual frame; never fatal to a session.
    #[error("malformed payload: {0}")]
    Decode(String),

    /// The service closed the stream gracefully.
    #[error("stream ended")]
    StreamEnded,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

/// Classification of connection-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportKind {
    #[error("request timed out")]
    Timeout,

    #[error("connection reset")]
    ConnectionReset,

    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    /// Whether a session may silently retry this failure.
    ///
    /// Only an idle timeout qualifies; everything else is either fatal for
    /// the attempt or handled by the completion check.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transport(TransportKind::Timeout))
    }

    /// Whether this is a connection-level failure (as opposed to a bad
    /// request, bad response, or bad configuration).
    pub fn is_transport(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }
}

/// Classify a reqwest failure into the transport taxonomy.
pub(crate) fn classify_transport(e: &reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        return ServiceError::Transport(TransportKind::Timeout);
    }
    if e.is_connect() || has_connection_reset(e) {
        return ServiceError::Transport(TransportKind::ConnectionReset);
    }
    ServiceError::Transport(TransportKind::Other(e.to_string()))
}

fn has_connection_reset(e: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionReset {
                return true;
            }
        }
        source = cause.source();
    }
    false
}
