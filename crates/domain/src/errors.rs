//! Error types used throughout the client
//!
//! Every failure surfaced to callers is a [`RestError`]. The variants split
//! into three families:
//!
//! - **Domain**: the server answered with a non-2xx status and (usually) an
//!   RFC 7807 style problem body. The request was delivered and rejected.
//! - **Transport**: the exchange itself failed (connection, timeout, an
//!   undecodable success body, or cancellation by a failing sibling).
//! - **Usage**: the caller handed us something unusable (bad configuration,
//!   duplicate request ids).
//!
//! Batch policies use this split to decide whether a failure aborts the batch.

use std::time::Duration;

use restbatch_common::{ErrorClassification, ErrorSeverity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for REST operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RestError {
    /// Server-side rejection, carrying the HTTP status and a
    /// human-readable message.
    #[error("{status} - {message}")]
    Domain { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A 2xx response whose body could not be decoded into the target type.
    #[error("Failed to decode response body: {0}")]
    Decode(String),

    /// The request was aborted before completing, typically because a
    /// sibling in the same batch failed.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad category of a [`RestError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestErrorCategory {
    Domain,
    Transport,
    Usage,
}

impl RestError {
    /// Build a domain error from a status code and message.
    pub fn domain(status: u16, message: impl Into<String>) -> Self {
        Self::Domain { status, message: message.into() }
    }

    pub fn category(&self) -> RestErrorCategory {
        match self {
            Self::Domain { .. } => RestErrorCategory::Domain,
            Self::Transport(_) | Self::Timeout(_) | Self::Decode(_) | Self::Cancelled => {
                RestErrorCategory::Transport
            }
            Self::InvalidRequest(_) | Self::Config(_) => RestErrorCategory::Usage,
        }
    }

    /// True when the server rejected the request.
    pub fn is_domain(&self) -> bool {
        self.category() == RestErrorCategory::Domain
    }

    /// True when the exchange failed below the application layer.
    pub fn is_transport(&self) -> bool {
        self.category() == RestErrorCategory::Transport
    }

    /// HTTP status of a domain error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Domain { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message without the status prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Domain { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl ErrorClassification for RestError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Domain { status, .. } => *status == 429 || *status >= 500,
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Decode(_) | Self::Cancelled | Self::InvalidRequest(_) | Self::Config(_) => {
                false
            }
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Cancelled => ErrorSeverity::Info,
            Self::Transport(_) | Self::Timeout(_) => ErrorSeverity::Warning,
            Self::Domain { status, .. } if *status == 401 || *status == 403 => {
                ErrorSeverity::Critical
            }
            Self::Domain { .. } | Self::Decode(_) | Self::InvalidRequest(_) => {
                ErrorSeverity::Error
            }
            Self::Config(_) => ErrorSeverity::Critical,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Domain { status: 429, .. } => Some(Duration::from_secs(60)),
            Self::Domain { status, .. } if *status >= 500 => Some(Duration::from_secs(10)),
            Self::Transport(_) | Self::Timeout(_) => Some(Duration::from_secs(5)),
            _ => None,
        }
    }
}

/// The failure that aborted a fail-fast batch
///
/// Carries the id of the request that failed first so callers can tell which
/// part of the batch caused the abort.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("request '{request_id}' failed: {error}")]
pub struct BatchFailure {
    pub request_id: String,
    #[source]
    pub error: RestError,
}

impl BatchFailure {
    pub fn new(request_id: impl Into<String>, error: RestError) -> Self {
        Self { request_id: request_id.into(), error }
    }

    pub fn into_error(self) -> RestError {
        self.error
    }
}

impl From<BatchFailure> for RestError {
    fn from(failure: BatchFailure) -> Self {
        failure.error
    }
}

/// Result type alias for REST operations
pub type Result<T> = std::result::Result<T, RestError>;
