//! Cloud queue destination.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, ValidationError, ValidationErrorDetail, tag};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::provider::{
    BaseProvider, PreprocessOptions, Provider, ProviderError, PublishLifecycle, Publisher,
    make_metadata,
};
use crate::providers::attempt;
use crate::time::{Clock, SystemClock};
use crate::transport::{AwsClientConfig, CloudConnector, QueueClient, QueueMessage};

/// Destination type key.
pub const PROVIDER_TYPE: &str = "aws_sqs";

/// Name of the message attribute carrying the JSON metadata.
const METADATA_ATTRIBUTE: &str = "metadata";

/// Splits a queue URL into its service base URL and, for AWS hosts, region.
fn parse_queue_url(queue_url: &str) -> Option<(url::Url, Option<String>)> {
    let parsed = super::http_url(queue_url)?;
    let host = parsed.host_str()?;
    let region = host
        .contains("amazonaws.com")
        .then(|| host.split('.').nth(1).map(str::to_string))
        .flatten();
    let base = url::Url::parse(&parsed.origin().ascii_serialization()).ok()?;
    Some((base, region))
}

/// Returns the console link for a queue hosted on AWS.
///
/// ```
/// use dest_registry::providers::aws::sqs_console_url;
///
/// assert_eq!(sqs_console_url("http://localhost:4566/000000000000/q"), None);
/// ```
#[must_use]
pub fn sqs_console_url(queue_url: &str) -> Option<String> {
    if !queue_url.contains(".amazonaws.com/") || !queue_url.contains("sqs.") {
        return None;
    }
    let parsed = url::Url::parse(queue_url).ok()?;
    let host = parsed.host_str()?;
    let mut labels = host.split('.');
    if labels.next() != Some("sqs") {
        return None;
    }
    let region = labels.next()?;
    labels.next()?;

    let encoded: String = url::form_urlencoded::byte_serialize(queue_url.as_bytes()).collect();
    Some(format!(
        "https://{region}.console.aws.amazon.com/sqs/v3/home?region={region}#/queues/{encoded}"
    ))
}

/// Provider for cloud queues.
pub struct SqsProvider {
    base: BaseProvider,
    connector: Arc<dyn CloudConnector<dyn QueueClient>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsProvider")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl SqsProvider {
    /// Loads the queue metadata and binds the connector.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        connector: Arc<dyn CloudConnector<dyn QueueClient>>,
    ) -> Result<Self, MetadataError> {
        Ok(Self {
            base: BaseProvider::new(loader, PROVIDER_TYPE)?,
            connector,
            clock: Arc::new(SystemClock),
        })
    }

    /// Sets the clock used for the metadata timestamp.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates `destination` and resolves its client configuration.
    ///
    /// The service endpoint is `endpoint` when set, else the queue URL's
    /// origin. The region comes from AWS queue hosts and is empty otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the schema rejects the destination or
    /// `endpoint` is not an absolute http(s) URL.
    pub fn resolve(
        &self,
        destination: &Destination,
    ) -> Result<(String, AwsClientConfig), ValidationError> {
        self.base.validate(destination)?;

        let mut errors = Vec::new();
        let endpoint = super::endpoint(destination, &mut errors);
        let queue_url = destination.config_value("queue_url").unwrap_or_default();
        let parsed = parse_queue_url(queue_url);
        if parsed.is_none() {
            errors.push(ValidationErrorDetail::new("config.queue_url", "format"));
        }
        ValidationError::check(errors)?;

        let (base, region) = parsed.unzip();
        let config = super::client_config(
            destination,
            region.flatten().unwrap_or_default(),
            endpoint.or(base),
        );
        Ok((queue_url.to_string(), config))
    }
}

#[async_trait]
impl Provider for SqsProvider {
    fn metadata(&self) -> &ProviderMetadata {
        self.base.metadata()
    }

    fn validate(&self, destination: &Destination) -> Result<(), ValidationError> {
        self.resolve(destination).map(|_| ())
    }

    fn create_publisher(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn Publisher>, ProviderError> {
        let (queue_url, config) = self.resolve(destination)?;
        let client = self.connector.connect(&config)?;
        tracing::info!(
            destination_id = %destination.id,
            queue_url = %queue_url,
            region = %config.region,
            "Created queue publisher"
        );
        Ok(Box::new(SqsPublisher {
            client,
            queue_url,
            clock: Arc::clone(&self.clock),
            lifecycle: PublishLifecycle::new(),
        }))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        let queue_url = destination.config_value("queue_url").unwrap_or_default();
        let target = DestinationTarget::new(queue_url);
        match sqs_console_url(queue_url) {
            Some(link) => target.with_url(link),
            None => target,
        }
    }

    async fn preprocess(
        &self,
        _ctx: &CallContext,
        destination: &mut Destination,
        _original: Option<&Destination>,
        _opts: &PreprocessOptions,
    ) -> Result<(), ValidationError> {
        self.validate(destination)
    }

    fn obfuscate_destination(&self, destination: &Destination) -> Destination {
        self.base.obfuscate_destination(destination)
    }
}

/// Sends one message per event to a queue.
pub struct SqsPublisher {
    client: Arc<dyn QueueClient>,
    queue_url: String,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
}

impl std::fmt::Debug for SqsPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsPublisher")
            .field("queue_url", &self.queue_url)
            .finish_non_exhaustive()
    }
}

impl SqsPublisher {
    /// Builds the queue message for `event`.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data or
    /// metadata cannot be serialized.
    pub fn format(&self, event: &Event) -> Result<QueueMessage, PublishAttemptError> {
        let format_error = |e: serde_json::Error| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        };

        let body = serde_json::to_string(&event.data).map_err(format_error)?;
        let metadata = serde_json::to_string(&make_metadata(event, self.clock.now()))
            .map_err(format_error)?;

        Ok(QueueMessage {
            queue_url: self.queue_url.clone(),
            body,
            attributes: [(METADATA_ATTRIBUTE.to_string(), metadata)].into(),
        })
    }
}

#[async_trait]
impl Publisher for SqsPublisher {
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let message = self.format(event)?;
        tracing::debug!(event_id = %event.id, queue_url = %self.queue_url, "Sending to queue");

        let receipt = attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            self.client.send_message(message),
            attempt::rejected,
        )
        .await?;

        Ok(Delivery::success(
            "OK",
            json!({ "message_id": receipt.message_id }),
        ))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;
        tracing::info!(queue_url = %self.queue_url, "Closed queue publisher");
        Ok(())
    }
}
