//! Error types for transport operations.

use thiserror::Error;

/// Error type for HTTP operations.
///
/// Describes what went wrong without dictating recovery strategy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// This includes DNS resolution failures, connection refused,
    /// and other network-level errors.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The provided URL is invalid.
    ///
    /// This indicates a configuration error rather than a transient failure.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Error type for broker and cloud transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport could not reach the service.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The service did not answer in time.
    #[error("Request timed out")]
    Timeout,

    /// The service answered with an error.
    #[error("Rejected ({code}): {message}")]
    Rejected {
        /// Service error code (e.g. `ResourceNotFoundException`).
        code: String,
        /// Service error message.
        message: String,
    },
}

impl TransportError {
    /// Creates a `Rejected` error.
    #[must_use]
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Returns the service error code, if the service answered.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            Self::Connection(_) | Self::Timeout => None,
        }
    }
}

/// Extension trait for checking if an error is retryable.
///
/// Publishers record this on every attempt error so the orchestrator can
/// decide whether to schedule another attempt.
pub trait IsRetryable {
    /// Returns true if the error is potentially transient.
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::InvalidUrl(_) => false,
        }
    }
}

impl IsRetryable for TransportError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Rejected { code, .. } => {
                let code = code.to_ascii_lowercase();
                code.contains("throttl") || code.contains("exceeded") || code.contains("unavailable")
            }
        }
    }
}

impl IsRetryable for http::StatusCode {
    fn is_retryable(&self) -> bool {
        self.is_server_error()
            || *self == Self::TOO_MANY_REQUESTS
            || *self == Self::REQUEST_TIMEOUT
    }
}
