//! Formats events as signed HTTP requests and sends them.

use std::sync::Arc;

use async_trait::async_trait;
use http::{HeaderName, HeaderValue};
use serde_json::json;

use super::options::WebhookOptions;
use super::signature::{SignatureManager, SignaturePayload};
use super::PROVIDER_TYPE;
use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, tag};
use crate::models::{Delivery, Event};
use crate::provider::{PublishLifecycle, Publisher};
use crate::providers::attempt;
use crate::time::Clock;
use crate::transport::{HttpClient, HttpRequest};

/// Sends one signed `POST` per event to a fixed URL.
///
/// # Wire format
///
/// - Body: the event `data` as JSON, `Content-Type: application/json`
/// - `{prefix}timestamp`, `{prefix}event-id`, `{prefix}topic` unless disabled
/// - `{prefix}signature` when a secret produces a signature, unless disabled
/// - `{prefix}<lowercased key>` per metadata entry
#[derive(Debug)]
pub struct WebhookPublisher<H> {
    client: H,
    url: url::Url,
    signer: SignatureManager,
    options: WebhookOptions,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
}

impl<H> WebhookPublisher<H> {
    /// Creates a publisher.
    #[must_use]
    pub fn new(
        client: H,
        url: url::Url,
        signer: SignatureManager,
        options: WebhookOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            client,
            url,
            signer,
            options,
            clock,
            lifecycle: PublishLifecycle::new(),
        }
    }

    /// Returns the destination URL.
    #[must_use]
    pub const fn url(&self) -> &url::Url {
        &self.url
    }

    /// Returns the signature manager.
    #[must_use]
    pub const fn signer(&self) -> &SignatureManager {
        &self.signer
    }

    /// Builds the HTTP request for `event`.
    ///
    /// Metadata entries that do not form valid header names or values are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data cannot
    /// be serialized.
    pub fn format(&self, event: &Event) -> Result<HttpRequest, PublishAttemptError> {
        let now = self.clock.now();
        let body = serde_json::to_string(&event.data).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        })?;

        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        if !self.options.disable_timestamp_header {
            self.set_header(&mut headers, "timestamp", &now.timestamp().to_string());
        }
        if !self.options.disable_event_id_header {
            self.set_header(&mut headers, "event-id", &event.id);
        }
        if !self.options.disable_topic_header {
            self.set_header(&mut headers, "topic", &event.topic);
        }
        if !self.options.disable_signature_header {
            let payload = SignaturePayload {
                event_id: &event.id,
                topic: &event.topic,
                timestamp: now,
                body: &body,
            };
            if let Some(signature) = self.signer.generate_signature_header(&payload) {
                self.set_header(&mut headers, "signature", &signature);
            }
        }
        for (key, value) in &event.metadata {
            self.set_header(&mut headers, &key.to_lowercase(), value);
        }

        let mut request = HttpRequest::post(self.url.clone()).with_body(body.into_bytes());
        request.headers = headers;
        Ok(request)
    }

    fn set_header(&self, headers: &mut http::HeaderMap, suffix: &str, value: &str) {
        let name = format!("{}{suffix}", self.options.header_prefix);
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping header that is not valid HTTP"),
        }
    }
}

#[async_trait]
impl<H> Publisher for WebhookPublisher<H>
where
    H: HttpClient + std::fmt::Debug + 'static,
{
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let request = self.format(event)?;
        tracing::debug!(event_id = %event.id, url = %self.url, "Sending webhook");

        let delivery = attempt::send_http(PROVIDER_TYPE, ctx, &self.client, request).await?;
        Ok(delivery)
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;
        tracing::info!(url = %self.url, "Closed webhook publisher");
        Ok(())
    }
}
