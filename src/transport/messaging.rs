//! Service Bus and Pub/Sub transport seams.
//!
//! Like the cloud seams, each connector builds one sender per publisher and
//! the publisher owns it until close.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::TransportError;
use crate::models::StringMap;

/// Connection settings for one Service Bus queue or topic.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceBusConfig {
    /// Queue or topic name.
    pub entity: String,
    /// Shared access connection string.
    pub connection_string: String,
}

impl fmt::Debug for ServiceBusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBusConfig")
            .field("entity", &self.entity)
            .field("connection_string", &"<redacted>")
            .finish()
    }
}

/// One Service Bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceBusMessage {
    /// Message body.
    pub body: Vec<u8>,
    /// Application properties.
    pub properties: StringMap,
}

/// Builds a sender for one Service Bus entity.
pub trait ServiceBusConnector: Send + Sync {
    /// Creates a sender bound to `config.entity`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the connection string is rejected.
    fn connect(&self, config: &ServiceBusConfig) -> Result<Arc<dyn ServiceBusSender>, TransportError>;
}

/// Sends messages to one Service Bus queue or topic.
#[async_trait]
pub trait ServiceBusSender: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the entity does not accept the message.
    async fn send_message(&self, message: ServiceBusMessage) -> Result<(), TransportError>;

    /// Releases the sender and its connection.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the service reports a close failure.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Connection settings for one Pub/Sub topic.
#[derive(Clone, PartialEq, Eq)]
pub struct PubSubConfig {
    /// Owning project.
    pub project_id: String,
    /// Topic id.
    pub topic: String,
    /// Emulator endpoint. Authentication is skipped when set.
    pub endpoint: Option<url::Url>,
    /// Service account key, when not using the emulator.
    pub service_account_json: Option<String>,
}

impl fmt::Debug for PubSubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSubConfig")
            .field("project_id", &self.project_id)
            .field("topic", &self.topic)
            .field("endpoint", &self.endpoint)
            .field(
                "service_account_json",
                &self.service_account_json.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// One Pub/Sub message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    /// Message data.
    pub data: Vec<u8>,
    /// String attributes.
    pub attributes: StringMap,
}

/// Builds a topic handle for one project.
pub trait PubSubConnector: Send + Sync {
    /// Creates a handle for `config.topic`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the client cannot be configured.
    fn connect(&self, config: &PubSubConfig) -> Result<Arc<dyn PubSubTopic>, TransportError>;
}

/// Publishes messages to one Pub/Sub topic.
#[async_trait]
pub trait PubSubTopic: Send + Sync {
    /// Publishes one message and waits for the server-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the topic does not accept the message.
    async fn publish(&self, message: PubSubMessage) -> Result<String, TransportError>;

    /// Flushes pending messages and releases the client.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the client reports a close failure.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_bus_debug_is_redacted() {
        let config = ServiceBusConfig {
            entity: "orders".to_string(),
            connection_string: "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKey=abc123"
                .to_string(),
        };

        let debug = format!("{config:?}");

        assert!(debug.contains("orders"));
        assert!(!debug.contains("abc123"));
    }

    #[test]
    fn pubsub_debug_is_redacted() {
        let config = PubSubConfig {
            project_id: "acme".to_string(),
            topic: "events".to_string(),
            endpoint: None,
            service_account_json: Some(r#"{"private_key":"-----BEGIN"}"#.to_string()),
        };

        let debug = format!("{config:?}");

        assert!(debug.contains("acme"));
        assert!(!debug.contains("private_key"));
    }
}
