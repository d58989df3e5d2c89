//! AMQP broker destination.
//!
//! Events are published on the configured exchange with the event topic as
//! routing key. The channel is opened on the first publish and re-opened
//! whenever the broker has closed it.

#[cfg(test)]
mod rabbitmq_tests;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;

use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, ValidationError, tag};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::provider::{
    BaseProvider, PreprocessOptions, Provider, ProviderError, PublishLifecycle, Publisher,
};
use crate::providers::attempt;
use crate::transport::{AmqpChannel, AmqpConnector, AmqpMessage, SecretUrl};

/// Destination type key.
pub const PROVIDER_TYPE: &str = "rabbitmq";

/// Resolved broker settings for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Connection URL with credentials.
    pub url: SecretUrl,
    /// Exchange to publish on.
    pub exchange: String,
    /// Whether the connection uses `amqps`.
    pub tls: bool,
}

/// Parses the `tls` flag. Absent means plain AMQP.
fn parse_tls(value: Option<&str>) -> Option<bool> {
    match value {
        None => Some(false),
        Some("true" | "on") => Some(true),
        Some("false" | "off") => Some(false),
        Some(_) => None,
    }
}

/// Composes `amqp[s]://user:pass@server_url` with the credentials
/// percent-encoded.
fn broker_url(server_url: &str, tls: bool, username: &str, password: &str) -> Option<SecretUrl> {
    let scheme = if tls { "amqps" } else { "amqp" };
    let mut url = url::Url::parse(&format!("{scheme}://{server_url}")).ok()?;
    if !url.has_host() {
        return None;
    }
    url.set_username(username).ok()?;
    url.set_password(Some(password)).ok()?;
    Some(SecretUrl::new(url.into()))
}

/// Provider for AMQP exchanges.
pub struct RabbitMqProvider {
    base: BaseProvider,
    connector: Arc<dyn AmqpConnector>,
}

impl std::fmt::Debug for RabbitMqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqProvider")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl RabbitMqProvider {
    /// Loads the broker metadata and binds the connector.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        connector: Arc<dyn AmqpConnector>,
    ) -> Result<Self, MetadataError> {
        Ok(Self {
            base: BaseProvider::new(loader, PROVIDER_TYPE)?,
            connector,
        })
    }

    /// Validates `destination` and resolves its broker settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the schema rejects the destination,
    /// `tls` is not a recognized flag, or the URL cannot be composed.
    pub fn resolve(&self, destination: &Destination) -> Result<BrokerConfig, ValidationError> {
        self.base.validate(destination)?;

        let tls = parse_tls(destination.config_value("tls"))
            .ok_or_else(|| ValidationError::single("config.tls", "invalid"))?;
        let server_url = destination.config_value("server_url").unwrap_or_default();
        let url = broker_url(
            server_url,
            tls,
            destination.credential_value("username").unwrap_or_default(),
            destination.credential_value("password").unwrap_or_default(),
        )
        .ok_or_else(|| ValidationError::single("config.server_url", "format"))?;

        Ok(BrokerConfig {
            url,
            exchange: destination
                .config_value("exchange")
                .unwrap_or_default()
                .to_string(),
            tls,
        })
    }
}

#[async_trait]
impl Provider for RabbitMqProvider {
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
        tracing::info!(
            destination_id = %destination.id,
            exchange = %config.exchange,
            tls = config.tls,
            "Created broker publisher"
        );
        Ok(Box::new(RabbitMqPublisher::new(
            Arc::clone(&self.connector),
            config,
        )))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        let exchange = destination.config_value("exchange").unwrap_or_default();
        DestinationTarget::new(format!("{exchange} -> {}", destination.topics.join(", ")))
    }

    async fn preprocess(
        &self,
        _ctx: &CallContext,
        destination: &mut Destination,
        _original: Option<&Destination>,
        _opts: &PreprocessOptions,
    ) -> Result<(), ValidationError> {
        let normalized = match destination.config_value("tls") {
            None | Some("off") => "false",
            Some("on") => "true",
            Some(other) => other,
        }
        .to_string();
        destination.config.insert("tls".to_string(), normalized);
        self.resolve(destination).map(|_| ())
    }

    fn obfuscate_destination(&self, destination: &Destination) -> Destination {
        self.base.obfuscate_destination(destination)
    }
}

/// Publishes events on one exchange over a lazily opened channel.
pub struct RabbitMqPublisher {
    connector: Arc<dyn AmqpConnector>,
    config: BrokerConfig,
    channel: Mutex<Option<Arc<dyn AmqpChannel>>>,
    lifecycle: PublishLifecycle,
}

impl std::fmt::Debug for RabbitMqPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqPublisher")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl RabbitMqPublisher {
    /// Creates a publisher; no connection is made until the first publish.
    #[must_use]
    pub fn new(connector: Arc<dyn AmqpConnector>, config: BrokerConfig) -> Self {
        Self {
            connector,
            config,
            channel: Mutex::new(None),
            lifecycle: PublishLifecycle::new(),
        }
    }

    /// Builds the broker message for `event`.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data cannot
    /// be serialized.
    pub fn format(&self, event: &Event) -> Result<AmqpMessage, PublishAttemptError> {
        let body = serde_json::to_vec(&event.data).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        })?;
        Ok(AmqpMessage {
            content_type: "application/json".to_string(),
            message_id: event.id.clone(),
            headers: event.metadata.clone(),
            body,
        })
    }

    async fn ensure_channel(
        &self,
        ctx: &CallContext,
    ) -> Result<Arc<dyn AmqpChannel>, PublishAttemptError> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref().filter(|c| c.is_open()) {
            return Ok(Arc::clone(channel));
        }

        if slot.take().is_some() {
            tracing::debug!(exchange = %self.config.exchange, "Broker channel closed, reconnecting");
        }
        let channel: Arc<dyn AmqpChannel> = attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            self.connector.connect(&self.config.url),
            |_| tag::CONNECTION,
        )
        .await?
        .into();

        *slot = Some(Arc::clone(&channel));
        Ok(channel)
    }
}

#[async_trait]
impl Publisher for RabbitMqPublisher {
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let message = self.format(event)?;
        let channel = self.ensure_channel(ctx).await?;
        tracing::debug!(
            event_id = %event.id,
            exchange = %self.config.exchange,
            routing_key = %event.topic,
            "Publishing to broker"
        );

        attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            channel.publish(&self.config.exchange, &event.topic, message),
            attempt::rejected,
        )
        .await?;

        Ok(Delivery::success("OK", json!({})))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;

        let channel = self.channel.lock().await.take();
        if let Some(channel) = channel {
            if let Err(e) = channel.close().await {
                tracing::warn!(exchange = %self.config.exchange, "Failed to close broker channel: {e}");
            }
        }
        tracing::info!(exchange = %self.config.exchange, "Closed broker publisher");
        Ok(())
    }
}
