//! Object store destination.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, ValidationError, ValidationErrorDetail, tag};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event, StringMap};
use crate::provider::{
    BaseProvider, KeyTemplate, PreprocessOptions, Provider, ProviderError, PublishLifecycle,
    Publisher, make_metadata,
};
use crate::providers::attempt;
use crate::time::{Clock, SystemClock};
use crate::transport::{AwsClientConfig, CloudConnector, ObjectStoreClient, PutObject};

/// Destination type key.
pub const PROVIDER_TYPE: &str = "aws_s3";

/// Object key used when no `key_template` is configured.
pub const DEFAULT_KEY_TEMPLATE: &str = "{{time.rfc3339_nano}}_{{metadata.event-id}}.json";

/// Object storage classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageClass {
    /// `STANDARD`
    #[default]
    Standard,
    /// `REDUCED_REDUNDANCY`
    ReducedRedundancy,
    /// `STANDARD_IA`
    StandardIa,
    /// `ONEZONE_IA`
    OnezoneIa,
    /// `INTELLIGENT_TIERING`
    IntelligentTiering,
    /// `GLACIER`
    Glacier,
    /// `DEEP_ARCHIVE`
    DeepArchive,
    /// `OUTPOSTS`
    Outposts,
    /// `GLACIER_IR`
    GlacierIr,
    /// `SNOW`
    Snow,
    /// `EXPRESS_ONEZONE`
    ExpressOnezone,
}

impl StorageClass {
    const ALL: [Self; 11] = [
        Self::Standard,
        Self::ReducedRedundancy,
        Self::StandardIa,
        Self::OnezoneIa,
        Self::IntelligentTiering,
        Self::Glacier,
        Self::DeepArchive,
        Self::Outposts,
        Self::GlacierIr,
        Self::Snow,
        Self::ExpressOnezone,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::ReducedRedundancy => "REDUCED_REDUNDANCY",
            Self::StandardIa => "STANDARD_IA",
            Self::OnezoneIa => "ONEZONE_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::Glacier => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
            Self::Outposts => "OUTPOSTS",
            Self::GlacierIr => "GLACIER_IR",
            Self::Snow => "SNOW",
            Self::ExpressOnezone => "EXPRESS_ONEZONE",
        }
    }
}

impl FromStr for StorageClass {
    type Err = String;

    /// Parses a storage class name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid storage class: {s:?}"))
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UTC time fields available to key templates as `time.*`.
#[derive(Debug, Serialize)]
struct TimeFields {
    year: String,
    month: String,
    day: String,
    hour: String,
    minute: String,
    second: String,
    date: String,
    datetime: String,
    unix: String,
    rfc3339: String,
    rfc3339_nano: String,
}

impl TimeFields {
    fn new(time: DateTime<Utc>) -> Self {
        Self {
            year: time.format("%Y").to_string(),
            month: time.format("%m").to_string(),
            day: time.format("%d").to_string(),
            hour: time.format("%H").to_string(),
            minute: time.format("%M").to_string(),
            second: time.format("%S").to_string(),
            date: time.format("%Y-%m-%d").to_string(),
            datetime: time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            unix: time.timestamp().to_string(),
            rfc3339: time.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            rfc3339_nano: rfc3339_nano(time),
        }
    }
}

/// RFC 3339 with the fractional seconds trimmed of trailing zeros.
fn rfc3339_nano(time: DateTime<Utc>) -> String {
    let seconds = time.format("%Y-%m-%dT%H:%M:%S");
    let nanos = time.timestamp_subsec_nanos() % 1_000_000_000;
    if nanos == 0 {
        return format!("{seconds}Z");
    }
    let fraction = format!("{nanos:09}");
    format!("{seconds}.{}Z", fraction.trim_end_matches('0'))
}

/// Resolved bucket settings for one destination.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Bucket name.
    pub bucket: String,
    /// Object key template.
    pub key_template: KeyTemplate,
    /// Storage class for every object.
    pub storage_class: StorageClass,
    /// Client configuration.
    pub client: AwsClientConfig,
}

/// Provider for object stores.
pub struct S3Provider {
    base: BaseProvider,
    connector: Arc<dyn CloudConnector<dyn ObjectStoreClient>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for S3Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Provider")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl S3Provider {
    /// Loads the object store metadata and binds the connector.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        connector: Arc<dyn CloudConnector<dyn ObjectStoreClient>>,
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

    /// Validates `destination` and resolves its bucket settings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] collecting every failure among the schema,
    /// `storage_class` (`enum`), `key_template` (`pattern`) and `endpoint`
    /// (`pattern`).
    pub fn resolve(&self, destination: &Destination) -> Result<BucketConfig, ValidationError> {
        self.base.validate(destination)?;

        let mut errors = Vec::new();
        let storage_class = destination
            .config_value("storage_class")
            .map_or(Ok(StorageClass::default()), str::parse::<StorageClass>)
            .unwrap_or_else(|_| {
                errors.push(ValidationErrorDetail::new("config.storage_class", "enum"));
                StorageClass::default()
            });
        let source = destination
            .config_value("key_template")
            .unwrap_or(DEFAULT_KEY_TEMPLATE);
        let key_template = KeyTemplate::parse(source).unwrap_or_else(|_| {
            errors.push(ValidationErrorDetail::new("config.key_template", "pattern"));
            KeyTemplate::empty()
        });
        let endpoint = super::endpoint(destination, &mut errors);
        ValidationError::check(errors)?;

        Ok(BucketConfig {
            bucket: destination
                .config_value("bucket")
                .unwrap_or_default()
                .to_string(),
            key_template,
            storage_class,
            client: super::client_config(
                destination,
                destination.config_value("region").unwrap_or_default(),
                endpoint,
            ),
        })
    }
}

#[async_trait]
impl Provider for S3Provider {
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
            bucket = %config.bucket,
            region = %config.client.region,
            storage_class = %config.storage_class,
            "Created object publisher"
        );
        Ok(Box::new(S3Publisher {
            client,
            bucket: config.bucket,
            key_template: config.key_template,
            storage_class: config.storage_class,
            clock: Arc::clone(&self.clock),
            lifecycle: PublishLifecycle::new(),
        }))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        let bucket = destination.config_value("bucket").unwrap_or_default();
        let region = destination.config_value("region").unwrap_or_default();
        DestinationTarget::new(format!("{bucket} in {region}")).with_url(format!(
            "https://s3.console.aws.amazon.com/s3/buckets/{bucket}?region={region}"
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

/// Writes one object per event to a bucket.
pub struct S3Publisher {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    key_template: KeyTemplate,
    storage_class: StorageClass,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
}

impl fmt::Debug for S3Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Publisher")
            .field("bucket", &self.bucket)
            .field("key_template", &self.key_template.source())
            .field("storage_class", &self.storage_class)
            .finish_non_exhaustive()
    }
}

impl S3Publisher {
    fn object_key(
        &self,
        event: &Event,
        metadata: &StringMap,
    ) -> Result<String, PublishAttemptError> {
        #[derive(Serialize)]
        struct KeyContext<'a> {
            data: &'a serde_json::Value,
            metadata: &'a StringMap,
            time: TimeFields,
        }

        let context = KeyContext {
            data: &event.data,
            metadata,
            time: TimeFields::new(event.time),
        };
        let key = self.key_template.render(&context).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": format!("failed to evaluate key template: {e}") }))
                .with_source(e)
        })?;
        if key.is_empty() {
            return Err(PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": "key template produced empty string" })));
        }
        Ok(key)
    }

    /// Builds the object for `event`.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data cannot be
    /// serialized or the key template renders empty or fails.
    pub fn format(&self, event: &Event) -> Result<PutObject, PublishAttemptError> {
        let body = serde_json::to_vec(&event.data).map_err(|e| {
            PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT)
                .with_data(json!({ "error": e.to_string() }))
                .with_source(e)
        })?;
        let metadata = make_metadata(event, self.clock.now());
        let key = self.object_key(event, &metadata)?;
        let checksum_sha256 = base64::engine::general_purpose::STANDARD.encode(Sha256::digest(&body));

        Ok(PutObject {
            bucket: self.bucket.clone(),
            key,
            body,
            content_type: "application/json".to_string(),
            checksum_sha256,
            storage_class: self.storage_class.as_str().to_string(),
            metadata,
        })
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let object = self.format(event)?;
        let key = object.key.clone();
        tracing::debug!(event_id = %event.id, bucket = %self.bucket, key = %key, "Writing object");

        let receipt = attempt::run_transport(
            PROVIDER_TYPE,
            ctx,
            self.client.put_object(object),
            attempt::rejected,
        )
        .await?;

        let mut response = json!({ "bucket": self.bucket, "key": key });
        if let Some(etag) = receipt.etag {
            response["etag"] = json!(etag);
        }
        if let Some(version_id) = receipt.version_id {
            response["version_id"] = json!(version_id);
        }
        Ok(Delivery::success("OK", response))
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;
        tracing::info!(bucket = %self.bucket, "Closed object publisher");
        Ok(())
    }
}
