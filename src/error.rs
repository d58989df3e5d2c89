//! Error types shared by every provider and publisher.
//!
//! - [`ValidationError`]: structured `{field, type}` details, recoverable by
//!   correcting input
//! - [`PublishError`]: lifecycle and publish-attempt failures surfaced to the
//!   orchestrator

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Delivery;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Dot-joined field path, `"root"` when empty.
    pub field: String,
    /// Error-kind tag (`required`, `invalid_type`, `pattern`, `enum`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationErrorDetail {
    /// Creates a detail.
    #[must_use]
    pub fn new(field: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: kind.into(),
        }
    }
}

/// Configuration or validation failure for a destination.
///
/// Serializes as `{"errors": [{"field": ..., "type": ...}]}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationError {
    /// Every collected failure, in discovery order.
    pub errors: Vec<ValidationErrorDetail>,
}

impl ValidationError {
    /// Creates an error from collected details.
    #[must_use]
    pub const fn new(errors: Vec<ValidationErrorDetail>) -> Self {
        Self { errors }
    }

    /// Creates an error with a single detail.
    #[must_use]
    pub fn single(field: impl Into<String>, kind: impl Into<String>) -> Self {
        Self::new(vec![ValidationErrorDetail::new(field, kind)])
    }

    /// Returns true if a detail with this field and kind is present.
    #[must_use]
    pub fn contains(&self, field: &str, kind: &str) -> bool {
        self.errors
            .iter()
            .any(|detail| detail.field == field && detail.kind == kind)
    }

    /// Converts collected details into a result.
    ///
    /// # Errors
    ///
    /// Returns the details as a [`ValidationError`] when any were collected.
    pub fn check(errors: Vec<ValidationErrorDetail>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self::new(errors))
        }
    }
}

fn summarize(errors: &[ValidationErrorDetail]) -> String {
    let mut out = String::new();
    for (i, detail) in errors.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} ({})", detail.field, detail.kind);
    }
    out
}

/// Well-known error tags carried by [`PublishAttemptError`].
pub mod tag {
    /// The call deadline expired.
    pub const TIMEOUT: &str = "timeout";
    /// The transport could not reach the destination.
    pub const CONNECTION: &str = "connection_failed";
    /// The destination answered with a non-success status.
    pub const REJECTED: &str = "request_failed";
    /// The event could not be converted to the wire format.
    pub const FORMAT: &str = "format_failed";
    /// The destination configuration could not be resolved.
    pub const CONFIG: &str = "invalid_config";
}

/// A failed attempt to deliver one event.
///
/// Carries the provider name, a classified tag and a diagnostic payload
/// (status code, truncated body). Never carries raw secrets.
#[derive(Debug, Error)]
#[error("{provider} publish failed: {tag}")]
pub struct PublishAttemptError {
    /// Provider type that attempted the publish.
    pub provider: String,
    /// Classified error tag, see [`tag`].
    pub tag: String,
    /// Diagnostic payload.
    pub data: serde_json::Value,
    /// Delivery record, when the destination produced one.
    pub delivery: Option<Delivery>,
    /// Whether a later attempt may succeed.
    pub retryable: bool,
    /// Underlying transport error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PublishAttemptError {
    /// Creates an attempt error with an empty diagnostic payload.
    #[must_use]
    pub fn new(provider: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            tag: tag.into(),
            data: serde_json::Value::Null,
            delivery: None,
            retryable: false,
            source: None,
        }
    }

    /// Creates a timeout-classified attempt error.
    #[must_use]
    pub fn timeout(provider: impl Into<String>) -> Self {
        Self::new(provider, tag::TIMEOUT).with_retryable(true)
    }

    /// Sets the diagnostic payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Attaches the delivery record.
    #[must_use]
    pub fn with_delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = Some(delivery);
        self
    }

    /// Marks the attempt as retryable or not.
    #[must_use]
    pub const fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Attaches the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns true if the attempt failed because its deadline expired.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.tag == tag::TIMEOUT
    }
}

/// Error returned by [`crate::provider::Publisher`] operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The publisher has begun closing and refuses new work.
    #[error("publisher closed")]
    Closed,

    /// The publish attempt failed.
    #[error(transparent)]
    Attempt(Box<PublishAttemptError>),

    /// Any other failure, such as a publisher that could not be built.
    #[error("Unexpected publish failure: {0}")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PublishError {
    /// Wraps any other error.
    #[must_use]
    pub fn unexpected(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Unexpected(error.into())
    }

    /// Returns true for the lifecycle error.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if the attempt failed because its deadline expired.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Attempt(e) if e.is_timeout())
    }

    /// Returns true if the orchestrator may retry the same event later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Closed | Self::Unexpected(_) => false,
            Self::Attempt(e) => e.retryable,
        }
    }

    /// Returns the attempt details, if any.
    #[must_use]
    pub fn attempt(&self) -> Option<&PublishAttemptError> {
        match self {
            Self::Attempt(e) => Some(e.as_ref()),
            Self::Closed | Self::Unexpected(_) => None,
        }
    }

    /// Returns the delivery record attached to a failed attempt.
    #[must_use]
    pub fn delivery(&self) -> Option<&Delivery> {
        self.attempt().and_then(|e| e.delivery.as_ref())
    }
}

impl From<PublishAttemptError> for PublishError {
    fn from(error: PublishAttemptError) -> Self {
        Self::Attempt(Box::new(error))
    }
}
