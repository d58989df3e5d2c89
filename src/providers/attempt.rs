//! Turns transport outcomes into deliveries and classified attempt errors.

use std::future::Future;

use serde_json::json;

use crate::context::CallContext;
use crate::error::{PublishAttemptError, tag};
use crate::models::Delivery;
use crate::transport::{HttpClient, HttpError, HttpRequest, IsRetryable, TransportError};

/// Response bodies in diagnostics are cut to this many bytes.
pub const DIAGNOSTIC_BODY_LIMIT: usize = 1024;

/// Sends one HTTP request under the call deadline.
///
/// 2xx and 3xx answers are successful deliveries. Everything else becomes a
/// [`PublishAttemptError`] carrying the status and truncated body.
pub async fn send_http<H: HttpClient>(
    provider: &str,
    ctx: &CallContext,
    client: &H,
    request: HttpRequest,
) -> Result<Delivery, PublishAttemptError> {
    let response = match ctx.run(client.request(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(http_error(provider, e)),
        Err(deadline) => {
            return Err(PublishAttemptError::timeout(provider)
                .with_delivery(Delivery::uncertain(tag::TIMEOUT, serde_json::Value::Null))
                .with_source(deadline));
        }
    };

    let code = response.status.as_u16().to_string();
    if response.status.as_u16() < 400 {
        let body = response
            .body_json()
            .unwrap_or_else(|| json!(response.truncated_body(DIAGNOSTIC_BODY_LIMIT)));
        return Ok(Delivery::success(code, body));
    }

    let data = json!({
        "status": response.status.as_u16(),
        "body": response.truncated_body(DIAGNOSTIC_BODY_LIMIT),
    });
    Err(PublishAttemptError::new(provider, tag::REJECTED)
        .with_delivery(Delivery::failed(code, data.clone()))
        .with_data(data)
        .with_retryable(response.status.is_retryable()))
}

/// Classifies an HTTP transport failure.
pub fn http_error(provider: &str, error: HttpError) -> PublishAttemptError {
    let retryable = error.is_retryable();
    let (tag, delivery) = match &error {
        HttpError::Timeout => (tag::TIMEOUT, Delivery::uncertain(tag::TIMEOUT, json!(null))),
        HttpError::Connection(_) => (
            tag::CONNECTION,
            Delivery::failed(tag::CONNECTION, json!(null)),
        ),
        HttpError::InvalidUrl(_) => (tag::CONFIG, Delivery::failed(tag::CONFIG, json!(null))),
    };
    PublishAttemptError::new(provider, tag)
        .with_data(json!({ "error": error.to_string() }))
        .with_delivery(delivery)
        .with_retryable(retryable)
        .with_source(error)
}

/// Runs a broker or cloud call under the call deadline.
///
/// `classify` maps a service rejection to an error tag.
pub async fn run_transport<T, F>(
    provider: &str,
    ctx: &CallContext,
    call: F,
    classify: fn(&TransportError) -> &'static str,
) -> Result<T, PublishAttemptError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match ctx.run(call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(transport_error(provider, e, classify)),
        Err(deadline) => Err(PublishAttemptError::timeout(provider)
            .with_delivery(Delivery::uncertain(tag::TIMEOUT, json!(null)))
            .with_source(deadline)),
    }
}

/// Classifies a broker or cloud transport failure.
pub fn transport_error(
    provider: &str,
    error: TransportError,
    classify: fn(&TransportError) -> &'static str,
) -> PublishAttemptError {
    let tag = match &error {
        TransportError::Timeout => tag::TIMEOUT,
        TransportError::Connection(_) => tag::CONNECTION,
        TransportError::Rejected { .. } => classify(&error),
    };
    let delivery = if tag == tag::TIMEOUT {
        Delivery::uncertain(tag, json!(null))
    } else {
        Delivery::failed(error.code().unwrap_or(tag), json!(null))
    };
    PublishAttemptError::new(provider, tag)
        .with_data(json!({ "error": error.to_string() }))
        .with_delivery(delivery)
        .with_retryable(error.is_retryable())
        .with_source(error)
}

/// Tags every rejection as a failed request.
pub const fn rejected(_: &TransportError) -> &'static str {
    tag::REJECTED
}
