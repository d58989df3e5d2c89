//! AMQP broker transport seam.
//!
//! The broker client itself lives outside this crate. Providers only need to
//! open a channel from a connection URL and publish one message on it.

use std::fmt;

use async_trait::async_trait;

use super::TransportError;
use crate::models::StringMap;

/// A connection URL that embeds credentials.
///
/// `Debug` and `Display` never print the URL; use
/// [`SecretUrl::expose_secret`] at the single point where the transport
/// needs it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretUrl(String);

impl SecretUrl {
    /// Wraps a composed URL.
    #[must_use]
    pub const fn new(url: String) -> Self {
        Self(url)
    }

    /// Returns the raw URL, credentials included.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretUrl(<redacted>)")
    }
}

impl fmt::Display for SecretUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// One message to publish on an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmqpMessage {
    /// MIME type of the body.
    pub content_type: String,
    /// Message id (the event id).
    pub message_id: String,
    /// Message headers.
    pub headers: StringMap,
    /// Message body.
    pub body: Vec<u8>,
}

/// Opens channels to a broker.
#[async_trait]
pub trait AmqpConnector: Send + Sync {
    /// Connects to the broker and opens a channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when the broker is unreachable
    /// or refuses the credentials.
    async fn connect(&self, url: &SecretUrl) -> Result<Box<dyn AmqpChannel>, TransportError>;
}

/// An open broker channel.
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    /// Publishes one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the broker does not accept the message.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: AmqpMessage,
    ) -> Result<(), TransportError>;

    /// Returns false once the channel or its connection has been closed.
    fn is_open(&self) -> bool;

    /// Closes the channel and its connection.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the broker reports a close failure.
    async fn close(&self) -> Result<(), TransportError>;
}
