//! Transport seams between providers and the outside world.
//!
//! This module provides:
//! - HTTP request/response types ([`HttpRequest`], [`HttpResponse`])
//! - The injectable HTTP client trait ([`HttpClient`]) and its reqwest
//!   implementation ([`ReqwestClient`])
//! - Broker traits for AMQP ([`AmqpConnector`], [`AmqpChannel`])
//! - Cloud queue, stream and object-store traits ([`QueueClient`],
//!   [`StreamClient`], [`ObjectStoreClient`])
//! - Messaging service traits ([`ServiceBusConnector`], [`PubSubConnector`])
//! - Error classification ([`IsRetryable`])

mod amqp;
mod aws;
mod client;
mod error;
mod http;
mod messaging;

#[cfg(test)]
mod client_tests;

pub use amqp::{AmqpChannel, AmqpConnector, AmqpMessage, SecretUrl};
pub use aws::{
    AwsClientConfig, AwsCredentials, CloudConnector, ObjectReceipt, ObjectStoreClient, PutObject,
    QueueClient, QueueMessage, QueueReceipt, StreamClient, StreamReceipt, StreamRecord,
};
pub use client::ReqwestClient;
pub use error::{HttpError, IsRetryable, TransportError};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use messaging::{
    PubSubConfig, PubSubConnector, PubSubMessage, PubSubTopic, ServiceBusConfig,
    ServiceBusConnector, ServiceBusMessage, ServiceBusSender,
};
