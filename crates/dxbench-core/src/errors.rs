//! Provider failure taxonomy. Transient kinds are eligible for retry;
//! everything else terminates the job on the spot.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum InferError {
    #[error("provider rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("provider request timed out")]
    Timeout,

    #[error("provider server error (status {status})")]
    Server { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("content policy refusal: {0}")]
    ContentPolicy(String),

    #[error("malformed provider reply: {0}")]
    Malformed(String),
}

impl InferError {
    /// True for failures a later attempt can plausibly fix.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InferError::RateLimited { .. }
                | InferError::Timeout
                | InferError::Server { .. }
                | InferError::Network(_)
        )
    }

    /// Server-suggested wait before the next attempt, when one was given.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            InferError::RateLimited {
                retry_after: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    /// Classify an HTTP error status. `retry_after` carries the value of a
    /// Retry-After header when the server sent one.
    pub fn from_status(status: u16, detail: String, retry_after: Option<u64>) -> Self {
        match status {
            401 | 403 => InferError::Auth(detail),
            408 => InferError::Timeout,
            429 => InferError::RateLimited { retry_after },
            s if s >= 500 => InferError::Server { status: s },
            _ => InferError::BadRequest(detail),
        }
    }

    /// Classify a transport-level failure from the HTTP client.
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            InferError::Timeout
        } else {
            InferError::Network(e.to_string())
        }
    }
}
