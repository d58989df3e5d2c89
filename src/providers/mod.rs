//! Concrete destination providers.
//!
//! This module provides:
//! - HTTP providers ([`webhook`], [`hookdeck`]) over an injected [`HttpClient`]
//! - A broker provider ([`rabbitmq`]) over an [`AmqpConnector`]
//! - Cloud providers ([`aws`]) over per-service [`CloudConnector`]s
//! - Messaging providers ([`servicebus`], [`pubsub`]) over their own connectors
//! - [`DefaultProviders`] to register whichever of them are wired

pub mod attempt;
pub mod aws;
pub mod hookdeck;
pub mod pubsub;
pub mod rabbitmq;
pub mod servicebus;
pub mod webhook;

use std::sync::Arc;

use crate::registry::{RegistryBuilder, RegistryError};
use crate::transport::{
    AmqpConnector, CloudConnector, HttpClient, ObjectStoreClient, PubSubConnector, QueueClient,
    ServiceBusConnector, StreamClient,
};

/// Transports for the providers to register.
///
/// HTTP providers are always registered; the others only when their
/// connector is supplied.
pub struct DefaultProviders<H> {
    http: H,
    webhook: webhook::WebhookOptions,
    relay: hookdeck::RelayEndpoints,
    amqp: Option<Arc<dyn AmqpConnector>>,
    queue: Option<Arc<dyn CloudConnector<dyn QueueClient>>>,
    stream: Option<Arc<dyn CloudConnector<dyn StreamClient>>>,
    object_store: Option<Arc<dyn CloudConnector<dyn ObjectStoreClient>>>,
    service_bus: Option<Arc<dyn ServiceBusConnector>>,
    pubsub: Option<Arc<dyn PubSubConnector>>,
}

impl<H> std::fmt::Debug for DefaultProviders<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultProviders")
            .field("webhook", &self.webhook)
            .field("relay", &self.relay)
            .field("amqp", &self.amqp.is_some())
            .field("queue", &self.queue.is_some())
            .field("stream", &self.stream.is_some())
            .field("object_store", &self.object_store.is_some())
            .field("service_bus", &self.service_bus.is_some())
            .field("pubsub", &self.pubsub.is_some())
            .finish_non_exhaustive()
    }
}

impl<H> DefaultProviders<H>
where
    H: HttpClient + Clone + std::fmt::Debug + 'static,
{
    /// HTTP providers only, with default options.
    #[must_use]
    pub fn new(http: H) -> Self {
        Self {
            http,
            webhook: webhook::WebhookOptions::default(),
            relay: hookdeck::RelayEndpoints::default(),
            amqp: None,
            queue: None,
            stream: None,
            object_store: None,
            service_bus: None,
            pubsub: None,
        }
    }

    /// Sets the webhook options.
    #[must_use]
    pub fn with_webhook_options(mut self, options: webhook::WebhookOptions) -> Self {
        self.webhook = options;
        self
    }

    /// Overrides the relay base URLs.
    #[must_use]
    pub fn with_relay_endpoints(mut self, endpoints: hookdeck::RelayEndpoints) -> Self {
        self.relay = endpoints;
        self
    }

    /// Enables the broker provider.
    #[must_use]
    pub fn with_amqp(mut self, connector: Arc<dyn AmqpConnector>) -> Self {
        self.amqp = Some(connector);
        self
    }

    /// Enables the queue provider.
    #[must_use]
    pub fn with_queue(mut self, connector: Arc<dyn CloudConnector<dyn QueueClient>>) -> Self {
        self.queue = Some(connector);
        self
    }

    /// Enables the stream provider.
    #[must_use]
    pub fn with_stream(mut self, connector: Arc<dyn CloudConnector<dyn StreamClient>>) -> Self {
        self.stream = Some(connector);
        self
    }

    /// Enables the object store provider.
    #[must_use]
    pub fn with_object_store(
        mut self,
        connector: Arc<dyn CloudConnector<dyn ObjectStoreClient>>,
    ) -> Self {
        self.object_store = Some(connector);
        self
    }

    /// Enables the Service Bus provider.
    #[must_use]
    pub fn with_service_bus(mut self, connector: Arc<dyn ServiceBusConnector>) -> Self {
        self.service_bus = Some(connector);
        self
    }

    /// Enables the Pub/Sub provider.
    #[must_use]
    pub fn with_pubsub(mut self, connector: Arc<dyn PubSubConnector>) -> Self {
        self.pubsub = Some(connector);
        self
    }

    /// Builds every wired provider with the builder's metadata loader and
    /// registers it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if metadata fails to load or a type is
    /// already registered.
    pub fn register(self, builder: &mut RegistryBuilder) -> Result<(), RegistryError> {
        let loader = &builder.loader().clone();
        builder.register(webhook::WebhookProvider::new(
            loader,
            self.http.clone(),
            self.webhook,
        )?)?;
        builder.register(
            hookdeck::HookdeckProvider::new(loader, self.http)?.with_endpoints(self.relay),
        )?;

        if let Some(connector) = self.amqp {
            builder.register(rabbitmq::RabbitMqProvider::new(loader, connector)?)?;
        }
        if let Some(connector) = self.queue {
            builder.register(aws::SqsProvider::new(loader, connector)?)?;
        }
        if let Some(connector) = self.stream {
            builder.register(aws::KinesisProvider::new(loader, connector)?)?;
        }
        if let Some(connector) = self.object_store {
            builder.register(aws::S3Provider::new(loader, connector)?)?;
        }
        if let Some(connector) = self.service_bus {
            builder.register(servicebus::ServiceBusProvider::new(loader, connector)?)?;
        }
        if let Some(connector) = self.pubsub {
            builder.register(pubsub::PubSubProvider::new(loader, connector)?)?;
        }
        Ok(())
    }
}
