//! Cloud queue, stream and object-store destinations.
//!
//! This module provides:
//! - [`SqsProvider`]: one queue message per event
//! - [`KinesisProvider`]: one stream record per event, keyed by template
//! - [`S3Provider`]: one object per event, named by template
//!
//! All three share credential resolution and `endpoint` validation.

mod kinesis;
mod s3;
mod sqs;

#[cfg(test)]
mod kinesis_tests;

use crate::error::ValidationErrorDetail;
use crate::models::Destination;
use crate::transport::{AwsClientConfig, AwsCredentials};

pub use kinesis::{KinesisProvider, KinesisPublisher};
pub use s3::{S3Provider, S3Publisher, StorageClass};
pub use sqs::{SqsProvider, SqsPublisher, sqs_console_url};

/// Static credentials from `key`, `secret` and optional `session`.
fn credentials(destination: &Destination) -> AwsCredentials {
    AwsCredentials {
        access_key_id: destination
            .credential_value("key")
            .unwrap_or_default()
            .to_string(),
        secret_access_key: destination
            .credential_value("secret")
            .unwrap_or_default()
            .to_string(),
        session_token: destination.credential_value("session").map(str::to_string),
    }
}

/// Parses an absolute http(s) URL.
fn http_url(raw: &str) -> Option<url::Url> {
    url::Url::parse(raw)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

/// Parses the optional `endpoint`, recording a `pattern` failure.
fn endpoint(
    destination: &Destination,
    errors: &mut Vec<ValidationErrorDetail>,
) -> Option<url::Url> {
    let raw = destination.config_value("endpoint")?;
    let parsed = http_url(raw);
    if parsed.is_none() {
        errors.push(ValidationErrorDetail::new("config.endpoint", "pattern"));
    }
    parsed
}

/// Builds the client configuration for `region`.
fn client_config(
    destination: &Destination,
    region: impl Into<String>,
    endpoint: Option<url::Url>,
) -> AwsClientConfig {
    AwsClientConfig {
        region: region.into(),
        endpoint,
        credentials: credentials(destination),
    }
}
