//! Cloud stream destination.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, ValidationError, ValidationErrorDetail, tag};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::provider::{
    BaseProvider, KeyTemplate, PreprocessOptions, Provider, ProviderError, PublishLifecycle,
    Publisher, make_metadata,
};
use crate::providers::attempt;
use crate::time::{Clock, SystemClock};
use crate::transport::{
    AwsClientConfig, CloudConnector, StreamClient, StreamRecord, TransportError,
};

/// Destination type key.
pub const PROVIDER_TYPE: &str = "aws_kinesis";

/// Maps a stream service rejection to an error tag.
fn classify(error: &TransportError) -> &'static str {
    let text = error.to_string();
    if text.contains("ResourceNotFoundException") {
        "stream_not_found"
    } else if text.contains("AccessDeniedException") {
        "access_denied"
    } else if text.contains("ProvisionedThroughputExceededException") {
        "throughput_exceeded"
    } else if text.contains("ValidationException") {
        "validation_error"
    } else {
        tag::REJECTED
    }
}

/// Resolved stream settings for one destination.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream name.
    pub stream_name: String,
    /// Partition key template.
    pub partition_key: KeyTemplate,
    /// Client configuration.
    pub client: AwsClientConfig,
}

/// Provider for cloud streams.
pub struct KinesisProvider {
    base: BaseProvider,
    connector: Arc<dyn CloudConnector<dyn StreamClient>>,
    metadata_in_payload: bool,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for KinesisProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KinesisProvider")
            .field("base", &self.base)
            .field("metadata_in_payload", &self.metadata_in_payload)
            .finish_non_exhaustive()
    }
}

impl KinesisProvider {
    /// Loads the stream metadata and binds the connector.
    ///
    /// Records carry `{metadata, data}` unless
    /// [`with_metadata_in_payload(false)`](Self::with_metadata_in_payload).
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        connector: Arc<dyn CloudConnector<dyn StreamClient>>,
    ) -> Result<Self, MetadataError> {
        Ok(Self {
            base: BaseProvider::new(loader, PROVIDER_TYPE)?,
            connector,
            metadata_in_payload: true,
            clock: Arc::new(SystemClock),
        })
    }

    /// Chooses between `{metadata, data}` records and bare data records.
    #[must_use]
    pub const fn with_metadata_in_payload(mut self, include: bool) -> Self {
        self.metadata_in_payload = include;
        self
    }

    /// Sets the clock used for the metadata timestamp.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validates `destination` and resolves its stream settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the schema rejects the destination,
    /// `endpoint` is not an absolute http(s) URL, or the partition key
    /// template does not parse.
    pub fn resolve(&self, destination: &Destination) -> Result<StreamConfig, ValidationError> {
        self.base.validate(destination)?;

        let mut errors = Vec::new();
        let endpoint = super::endpoint(destination, &mut errors);
        let partition_key =
            KeyTemplate::parse(destination.config_value("partition_key_template").unwrap_or_default())
                .unwrap_or_else(|_| {
                    errors.push(ValidationErrorDetail::new(
                        "config.partition_key_template",
                        "pattern",
                    ));
                    KeyTemplate::empty()
                });
        ValidationError::check(errors)?;

        Ok(StreamConfig {
            stream_name: destination
                .config_value("stream_name")
                .unwrap_or_default()
                .to_string(),
            partition_key,
            client: super::client_config(
                destination,
                destination.config_value("region").unwrap_or_default(),
                endpoint,
            ),
        })
    }
}

#[async_trait]
impl Provider for KinesisProvider {
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
        let config = self.resolve(destination)?;
        let client = self.connector.connect(&config.client)?;
        tracing::info!(
            destination_id = %destination.id,
            stream_name = %config.stream_name,
            region = %config.client.region,
            metadata_in_payload = self.metadata_in_payload,
            "Created stream publisher"
        );
        Ok(Box::new(KinesisPublisher {
            client,
            stream_name: config.stream_name,
            partition_key: config.partition_key,
            metadata_in_payload: self.metadata_in_payload,
            clock: Arc::clone(&self.clock),
            lifecycle: PublishLifecycle::new(),
        }))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        DestinationTarget::new(format!(
            "{} in {}",
            destination.config_value("stream_name").unwrap_or_default(),
            destination.config_value("region").unwrap_or_default()
        ))
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

/// Puts one record per event on a stream.
pub struct KinesisPublisher {
    client: Arc<dyn StreamClient>,
    stream_name: String,
    partition_key: KeyTemplate,
    metadata_in_payload: bool,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
}

impl std::fmt::Debug for KinesisPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KinesisPublisher")
            .field("stream_name", &self.stream_name)
            .field("partition_key", &self.partition_key.source())
            .finish_non_exhaustive()
    }
}

impl KinesisPublisher {
    /// Builds the stream record for `event`.
    ///
    /// The partition key falls back to the event id; it never fails the
    /// publish.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the payload
    /// cannot be serialized.
    pub fn format(&self, event: &Event) -> Result<StreamRecord, PublishAttemptError> {
        let metadata = make_metadata(event, self.clock.now());
        let payload = if self.metadata_in_payload {
            json!({ "metadata": metadata, "data": event.data })
        } else {
            event.data.clone()
        };
        let data = serde_json::to_vec(&payload).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        })?;

        Ok(StreamRecord {
            stream_name: self.stream_name.clone(),
            partition_key: self.partition_key.partition_key_with(event, &metadata),
            data,
        })
    }
}

#[async_trait]
impl Publisher for KinesisPublisher {
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let record = self.format(event)?;
        let partition_key = record.partition_key.clone();
        tracing::debug!(
            event_id = %event.id,
            stream_name = %self.stream_name,
            partition_key = %partition_key,
            "Putting stream record"
        );

        let receipt = attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            self.client.put_record(record),
            classify,
        )
        .await
        .map_err(|e| {
            let data = json!({
                "error": e.tag.clone(),
                "stream_name": self.stream_name,
                "partition_key": partition_key,
            });
            e.with_data(data)
        })?;

        Ok(Delivery::success(
            "OK",
            json!({
                "shard_id": receipt.shard_id,
                "sequence_number": receipt.sequence_number,
                "partition_key": partition_key,
            }),
        ))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;
        tracing::info!(stream_name = %self.stream_name, "Closed stream publisher");
        Ok(())
    }
}
