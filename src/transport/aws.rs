//! Cloud queue, stream and object-store transport seams.
//!
//! Each provider receives a [`CloudConnector`] that builds one client per
//! publisher from the destination's region, endpoint and credentials. The
//! client is owned by that publisher and never shared across destinations.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::TransportError;
use crate::models::StringMap;

/// Static credentials for a cloud account.
#[derive(Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Optional session token.
    pub session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Everything needed to build a client for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsClientConfig {
    /// Region (e.g. `us-east-1`).
    pub region: String,
    /// Custom endpoint (e.g. a local emulator).
    pub endpoint: Option<url::Url>,
    /// Account credentials.
    pub credentials: AwsCredentials,
}

/// Builds a transport client for one destination.
pub trait CloudConnector<C: ?Sized>: Send + Sync {
    /// Creates a client bound to the given account and region.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the client cannot be configured.
    fn connect(&self, config: &AwsClientConfig) -> Result<Arc<C>, TransportError>;
}

/// One message for a cloud queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Queue URL.
    pub queue_url: String,
    /// Message body.
    pub body: String,
    /// String message attributes.
    pub attributes: StringMap,
}

/// Queue acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueReceipt {
    /// Message id assigned by the queue.
    pub message_id: String,
}

/// Sends messages to a cloud queue.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Sends one message.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the queue does not accept the message.
    async fn send_message(&self, message: QueueMessage) -> Result<QueueReceipt, TransportError>;
}

/// One record for a cloud stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    /// Stream name.
    pub stream_name: String,
    /// Partition key.
    pub partition_key: String,
    /// Record payload.
    pub data: Vec<u8>,
}

/// Stream acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReceipt {
    /// Shard the record landed on.
    pub shard_id: String,
    /// Sequence number within the shard.
    pub sequence_number: String,
}

/// Puts records on a cloud stream.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Puts one record.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the stream does not accept the record.
    async fn put_record(&self, record: StreamRecord) -> Result<StreamReceipt, TransportError>;
}

/// One object for an object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object body.
    pub body: Vec<u8>,
    /// MIME type of the body.
    pub content_type: String,
    /// Base64 SHA-256 of the body.
    pub checksum_sha256: String,
    /// Storage class.
    pub storage_class: String,
    /// User metadata.
    pub metadata: StringMap,
}

/// Object store acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectReceipt {
    /// Entity tag, when returned.
    pub etag: Option<String>,
    /// Version id, when the bucket is versioned.
    pub version_id: Option<String>,
}

/// Writes objects to a bucket.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Writes one object.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the bucket does not accept the object.
    async fn put_object(&self, object: PutObject) -> Result<ObjectReceipt, TransportError>;
}
