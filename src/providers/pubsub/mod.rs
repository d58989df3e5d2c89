//! Pub/Sub topic destination.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

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
use crate::transport::{PubSubConfig, PubSubConnector, PubSubMessage, PubSubTopic};

#[cfg(test)]
mod pubsub_tests;

/// Destination type key.
pub const PROVIDER_TYPE: &str = "gcp_pubsub";

/// Provider for Pub/Sub topics.
pub struct PubSubProvider {
    base: BaseProvider,
    connector: Arc<dyn PubSubConnector>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PubSubProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubProvider")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl PubSubProvider {
    /// Loads the Pub/Sub metadata and binds the connector.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        connector: Arc<dyn PubSubConnector>,
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
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the schema rejects the destination,
    /// `endpoint` is not an absolute http(s) URL, or the service account key
    /// is not a JSON object.
    pub fn resolve(&self, destination: &Destination) -> Result<PubSubConfig, ValidationError> {
        self.base.validate(destination)?;

        let mut errors = Vec::new();
        let endpoint = match destination.config_value("endpoint") {
            Some(raw) => {
                let parsed = url::Url::parse(raw)
                    .ok()
                    .filter(|u| matches!(u.scheme(), "http" | "https") && u.has_host());
                if parsed.is_none() {
                    errors.push(ValidationErrorDetail::new("config.endpoint", "pattern"));
                }
                parsed
            }
            None => None,
        };

        let service_account_json = destination.credential_value("service_account_json");
        if let Some(raw) = service_account_json {
            let is_object = serde_json::from_str::<serde_json::Value>(raw)
                .is_ok_and(|value| value.is_object());
            if !is_object {
                errors.push(ValidationErrorDetail::new(
                    "credentials.service_account_json",
                    "format",
                ));
            }
        }
        ValidationError::check(errors)?;

        Ok(PubSubConfig {
            project_id: destination
                .config_value("project_id")
                .unwrap_or_default()
                .to_string(),
            topic: destination
                .config_value("topic")
                .unwrap_or_default()
                .to_string(),
            service_account_json: endpoint
                .is_none()
                .then(|| service_account_json.map(str::to_string))
                .flatten(),
            endpoint,
        })
    }
}

#[async_trait]
impl Provider for PubSubProvider {
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
        let topic = self.connector.connect(&config)?;
        tracing::info!(
            destination_id = %destination.id,
            project = %config.project_id,
            topic = %config.topic,
            emulator = config.endpoint.is_some(),
            "Created Pub/Sub publisher"
        );
        Ok(Box::new(PubSubPublisher {
            topic,
            project_id: config.project_id,
            topic_id: config.topic,
            clock: Arc::clone(&self.clock),
            lifecycle: PublishLifecycle::new(),
            released: AtomicBool::new(false),
        }))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        let project = destination.config_value("project_id").unwrap_or_default();
        let topic = destination.config_value("topic").unwrap_or_default();
        let target = DestinationTarget::new(format!("{project}/{topic}"));
        if project.is_empty() || topic.is_empty() {
            return target;
        }
        target.with_url(format!(
            "https://console.cloud.google.com/cloudpubsub/topic/detail/{topic}?project={project}"
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

/// Publishes one message per event to a topic.
pub struct PubSubPublisher {
    topic: Arc<dyn PubSubTopic>,
    project_id: String,
    topic_id: String,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
    released: AtomicBool,
}

impl std::fmt::Debug for PubSubPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubPublisher")
            .field("project_id", &self.project_id)
            .field("topic_id", &self.topic_id)
            .finish_non_exhaustive()
    }
}

impl PubSubPublisher {
    /// Builds the message for `event`: data JSON as the payload, metadata as
    /// attributes.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data cannot
    /// be serialized.
    pub fn format(&self, event: &Event) -> Result<PubSubMessage, PublishAttemptError> {
        let data = serde_json::to_vec(&event.data).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        })?;

        Ok(PubSubMessage {
            data,
            attributes: make_metadata(event, self.clock.now()),
        })
    }
}

#[async_trait]
impl Publisher for PubSubPublisher {
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let message = self.format(event)?;
        tracing::debug!(event_id = %event.id, topic = %self.topic_id, "Publishing to Pub/Sub");

        let message_id = attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            self.topic.publish(message),
            attempt::rejected,
        )
        .await?;

        Ok(Delivery::success(
            "OK",
            json!({
                "message_id": message_id,
                "topic": self.topic_id,
                "project": self.project_id,
            }),
        ))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;

        if !self.released.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.topic.close().await {
                tracing::warn!(topic = %self.topic_id, "Failed to close Pub/Sub client: {e}");
            }
            tracing::info!(topic = %self.topic_id, "Closed Pub/Sub publisher");
        }
        Ok(())
    }
}
