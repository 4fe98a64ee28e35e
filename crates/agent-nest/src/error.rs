//! Error types for the A2A integration layer

use std::time::Duration;
use thiserror::Error;

/// Result type alias for agent-nest
pub type Result<T> = std::result::Result<T, NestError>;

/// Failure talking to the registry or a peer agent
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// No answer within the configured timeout
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Could not reach the remote side
    #[error("connection error: {0}")]
    Connection(String),

    /// Remote side answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not what we expected
    #[error("malformed response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Timeouts, connection failures and 5xx responses are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) => false,
        }
    }

    /// Classify a reqwest failure
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Error type for the A2A integration layer
#[derive(Debug, Error)]
pub enum NestError {
    /// Malformed or unsupported query
    #[error("{0}")]
    Validation(String),

    /// Target agent is not in the registry
    #[error("Agent '{0}' is not registered in the NANDA network")]
    Discovery(String),

    /// Registry or peer could not be reached
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// The analysis collaborator failed
    #[error("{0}")]
    Collaborator(String),

    /// The analysis collaborator answered without a recommendation
    #[error("{0}")]
    IncompleteAnalysis(String),

    /// A forwarded message could not be delivered or answered
    #[error("forwarding to '{target}' failed: {source}")]
    Forward {
        target: String,
        source: Box<NestError>,
    },

    /// A peer accepted a forwarded message but replied with nothing
    #[error("No response received from agent '{0}'")]
    NoResponse(String),

    /// Anything unanticipated
    #[error("Unexpected error: {0}")]
    Internal(String),

    /// Lifecycle method called twice
    #[error("{0} is already running")]
    AlreadyRunning(&'static str),

    /// Integration is disabled or has no registry configured
    #[error("NEST integration is not enabled: {0}")]
    NotEnabled(String),

    /// Configuration failed validation
    #[error("invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
