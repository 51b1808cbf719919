//! Error types shared by the transport, executor, and client.
//!
//! Every failed attempt ends up as an [`ApiError`]. The executor derives an
//! [`ErrorClass`] from the error's HTTP status to decide whether to retry.

use thiserror::Error;

use crate::api::retry::ErrorClass;

/// Result type for chatwire operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors surfaced to callers.
///
/// HTTP failures keep the original status and response body so callers can
/// diagnose them after retries are exhausted.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Client construction or request building failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// 401 or 403. Never retried.
    #[error("authentication failed (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    /// 429.
    #[error("rate limited (HTTP 429): {body}")]
    RateLimited { body: String },

    /// Any 5xx.
    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Failure while connecting, establishing, or reading a response stream.
    #[error("transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A buffered response body was not valid JSON.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Build the error variant matching a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Self::Auth { status, body },
            429 => Self::RateLimited { body },
            500..=599 => Self::Server { status, body },
            _ => Self::Http { status, body },
        }
    }

    /// A transport failure with no HTTP status attached.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// The HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } | Self::Server { status, .. } | Self::Http { status, .. } => {
                Some(*status)
            }
            Self::RateLimited { .. } => Some(429),
            Self::Transport { status, .. } => *status,
            Self::Config(_) | Self::Decode(_) => None,
        }
    }

    /// The response body returned with an HTTP failure.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Auth { body, .. }
            | Self::RateLimited { body }
            | Self::Server { body, .. }
            | Self::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Retry classification of this error.
    pub fn class(&self) -> ErrorClass {
        ErrorClass::from_status(self.status())
    }
}
