//! Service Bus queue or topic destination.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, ValidationError, tag};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::provider::{
    BaseProvider, PreprocessOptions, Provider, ProviderError, PublishLifecycle, Publisher,
    make_metadata,
};
use crate::providers::attempt;
use crate::time::{Clock, SystemClock};
use crate::transport::{ServiceBusConfig, ServiceBusConnector, ServiceBusMessage, ServiceBusSender};

#[cfg(test)]
mod servicebus_tests;

/// Destination type key.
pub const PROVIDER_TYPE: &str = "azure_servicebus";

/// Returns the `Endpoint` value of a connection string.
fn endpoint(connection_string: &str) -> Option<&str> {
    connection_string
        .split(';')
        .find_map(|part| part.trim().strip_prefix("Endpoint="))
        .filter(|value| !value.is_empty())
}

/// Extracts the namespace from `Endpoint=sb://<namespace>.servicebus.windows.net/`.
///
/// ```
/// use dest_registry::providers::servicebus::namespace;
///
/// let conn = "Endpoint=sb://acme.servicebus.windows.net/;SharedAccessKeyName=send;SharedAccessKey=k";
/// assert_eq!(namespace(conn), Some("acme"));
/// assert_eq!(namespace("SharedAccessKey=k"), None);
/// ```
#[must_use]
pub fn namespace(connection_string: &str) -> Option<&str> {
    let host = endpoint(connection_string)?;
    let host = host.strip_prefix("sb://").unwrap_or(host);
    match host.find('.') {
        Some(idx) if idx > 0 => Some(&host[..idx]),
        _ => None,
    }
}

/// Provider for Service Bus queues and topics.
pub struct ServiceBusProvider {
    base: BaseProvider,
    connector: Arc<dyn ServiceBusConnector>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ServiceBusProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBusProvider")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl ServiceBusProvider {
    /// Loads the Service Bus metadata and binds the connector.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        connector: Arc<dyn ServiceBusConnector>,
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

    /// Validates `destination` and resolves its connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the schema rejects the destination or
    /// the connection string has no `Endpoint`.
    pub fn resolve(&self, destination: &Destination) -> Result<ServiceBusConfig, ValidationError> {
        self.base.validate(destination)?;

        let connection_string = destination
            .credential_value("connection_string")
            .unwrap_or_default();
        if endpoint(connection_string).is_none() {
            return Err(ValidationError::single(
                "credentials.connection_string",
                "format",
            ));
        }

        Ok(ServiceBusConfig {
            entity: destination
                .config_value("name")
                .unwrap_or_default()
                .to_string(),
            connection_string: connection_string.to_string(),
        })
    }
}

#[async_trait]
impl Provider for ServiceBusProvider {
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
        let sender = self.connector.connect(&config)?;
        tracing::info!(
            destination_id = %destination.id,
            entity = %config.entity,
            "Created Service Bus publisher"
        );
        Ok(Box::new(ServiceBusPublisher {
            sender,
            entity: config.entity,
            clock: Arc::clone(&self.clock),
            lifecycle: PublishLifecycle::new(),
            released: AtomicBool::new(false),
        }))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        let name = destination.config_value("name").unwrap_or_default();
        let parsed = destination
            .credential_value("connection_string")
            .and_then(namespace);
        match parsed {
            Some(ns) if !name.is_empty() => DestinationTarget::new(format!("{ns}/{name}")),
            _ => DestinationTarget::new(name),
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

/// Sends one message per event to a queue or topic.
pub struct ServiceBusPublisher {
    sender: Arc<dyn ServiceBusSender>,
    entity: String,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
    released: AtomicBool,
}

impl std::fmt::Debug for ServiceBusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBusPublisher")
            .field("entity", &self.entity)
            .finish_non_exhaustive()
    }
}

impl ServiceBusPublisher {
    /// Builds the message for `event`: data JSON as the body, metadata as
    /// application properties.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data cannot
    /// be serialized.
    pub fn format(&self, event: &Event) -> Result<ServiceBusMessage, PublishAttemptError> {
        let body = serde_json::to_vec(&event.data).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        })?;

        Ok(ServiceBusMessage {
            body,
            properties: make_metadata(event, self.clock.now()),
        })
    }
}

#[async_trait]
impl Publisher for ServiceBusPublisher {
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let message = self.format(event)?;
        tracing::debug!(event_id = %event.id, entity = %self.entity, "Sending to Service Bus");

        attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            self.sender.send_message(message),
            attempt::rejected,
        )
        .await?;

        Ok(Delivery::success("OK", json!({})))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;

        if !self.released.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.sender.close().await {
                tracing::warn!(entity = %self.entity, "Failed to close Service Bus sender: {e}");
            }
            tracing::info!(entity = %self.entity, "Closed Service Bus publisher");
        }
        Ok(())
    }
}
