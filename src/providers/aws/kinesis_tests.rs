//! Tests for the stream provider and publisher.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use serde_json::json;

use super::kinesis::KinesisProvider;
use crate::context::CallContext;
use crate::metadata::MetadataLoader;
use crate::models::{DeliveryStatus, Destination, Event};
use crate::provider::Provider;
use crate::time::FixedClock;
use crate::transport::{
    AwsClientConfig, CloudConnector, StreamClient, StreamReceipt, StreamRecord, TransportError,
};

#[derive(Debug, Default)]
struct MockStream {
    records: Mutex<Vec<StreamRecord>>,
    reject: Option<&'static str>,
}

#[async_trait::async_trait]
impl StreamClient for MockStream {
    async fn put_record(&self, record: StreamRecord) -> Result<StreamReceipt, TransportError> {
        if let Some(code) = self.reject {
            return Err(TransportError::rejected(code, "stream refused the record"));
        }
        self.records.lock().unwrap().push(record);
        Ok(StreamReceipt {
            shard_id: "shardId-000000000000".to_string(),
            sequence_number: "4959".to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct MockConnector {
    stream: Arc<MockStream>,
}

impl CloudConnector<dyn StreamClient> for MockConnector {
    fn connect(&self, _config: &AwsClientConfig) -> Result<Arc<dyn StreamClient>, TransportError> {
        Ok(Arc::clone(&self.stream) as Arc<dyn StreamClient>)
    }
}

fn provider(connector: Arc<MockConnector>) -> KinesisProvider {
    KinesisProvider::new(&MetadataLoader::new(), connector)
        .unwrap()
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
        )))
}

fn destination() -> Destination {
    Destination::new("des_1", "aws_kinesis")
        .with_config("stream_name", "orders")
        .with_config("region", "eu-west-1")
        .with_credential("key", "AKIAEXAMPLE")
        .with_credential("secret", "wJalrXUtnFEMI")
}

fn event() -> Event {
    Event::new("evt_1", "order.created", json!({"customer": {"id": "cus_9"}}))
        .with_metadata("region", "eu")
}

mod validate {
    use super::*;

    #[test]
    fn accepts_minimal_destination() {
        let provider = provider(Arc::new(MockConnector::default()));

        assert!(provider.validate(&destination()).is_ok());
    }

    #[test]
    fn broken_template_is_pattern_failure() {
        let provider = provider(Arc::new(MockConnector::default()));
        let destination = destination().with_config("partition_key_template", "{{#each data}}");

        let error = provider.validate(&destination).unwrap_err();

        assert!(error.contains("config.partition_key_template", "pattern"), "{error}");
    }

    #[test]
    fn collects_template_and_endpoint_failures() {
        let provider = provider(Arc::new(MockConnector::default()));
        let destination = destination()
            .with_config("partition_key_template", "{{#if}}")
            .with_config("endpoint", "ftp://localstack");

        let error = provider.validate(&destination).unwrap_err();

        assert_eq!(error.errors.len(), 2);
        assert!(error.contains("config.endpoint", "pattern"));
    }

    #[test]
    fn target_names_stream_and_region() {
        let provider = provider(Arc::new(MockConnector::default()));

        assert_eq!(provider.compute_target(&destination()).target, "orders in eu-west-1");
    }
}

mod publish {
    use super::*;

    #[tokio::test]
    async fn wraps_metadata_and_data_by_default() {
        let connector = Arc::new(MockConnector::default());
        let publisher = provider(Arc::clone(&connector))
            .create_publisher(&destination())
            .unwrap();

        let delivery = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap();

        assert_eq!(delivery.status, DeliveryStatus::Success);
        assert_eq!(delivery.response["shard_id"], "shardId-000000000000");
        assert_eq!(delivery.response["sequence_number"], "4959");
        assert_eq!(delivery.response["partition_key"], "evt_1");

        let records = connector.stream.records.lock().unwrap();
        assert_eq!(records[0].stream_name, "orders");
        let payload: serde_json::Value = serde_json::from_slice(&records[0].data).unwrap();
        assert_eq!(payload["data"], json!({"customer": {"id": "cus_9"}}));
        assert_eq!(payload["metadata"]["event-id"], "evt_1");
        assert_eq!(payload["metadata"]["region"], "eu");
    }

    #[tokio::test]
    async fn bare_data_when_metadata_excluded() {
        let connector = Arc::new(MockConnector::default());
        let publisher = provider(Arc::clone(&connector))
            .with_metadata_in_payload(false)
            .create_publisher(&destination())
            .unwrap();

        publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap();

        let records = connector.stream.records.lock().unwrap();
        let payload: serde_json::Value = serde_json::from_slice(&records[0].data).unwrap();
        assert_eq!(payload, json!({"customer": {"id": "cus_9"}}));
    }

    #[tokio::test]
    async fn partition_key_from_template() {
        let connector = Arc::new(MockConnector::default());
        let destination = destination()
            .with_config("partition_key_template", "{{metadata.topic}}:{{data.customer.id}}");
        let publisher = provider(Arc::clone(&connector))
            .create_publisher(&destination)
            .unwrap();

        let delivery = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap();

        assert_eq!(delivery.response["partition_key"], "order.created:cus_9");
        assert_eq!(
            connector.stream.records.lock().unwrap()[0].partition_key,
            "order.created:cus_9"
        );
    }

    #[tokio::test]
    async fn missing_template_value_falls_back_to_event_id() {
        let connector = Arc::new(MockConnector::default());
        let destination = destination().with_config("partition_key_template", "{{data.absent}}");
        let publisher = provider(Arc::clone(&connector))
            .create_publisher(&destination)
            .unwrap();

        let delivery = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap();

        assert_eq!(delivery.response["partition_key"], "evt_1");
    }

    #[tokio::test]
    async fn classifies_stream_rejections() {
        for (code, expected) in [
            ("ResourceNotFoundException", "stream_not_found"),
            ("AccessDeniedException", "access_denied"),
            ("ProvisionedThroughputExceededException", "throughput_exceeded"),
            ("ValidationException", "validation_error"),
            ("InternalFailure", "request_failed"),
        ] {
            let connector = Arc::new(MockConnector {
                stream: Arc::new(MockStream {
                    reject: Some(code),
                    ..MockStream::default()
                }),
            });
            let publisher = provider(Arc::clone(&connector))
                .create_publisher(&destination())
                .unwrap();

            let error = publisher
                .publish(&CallContext::background(), &event())
                .await
                .unwrap_err();

            let attempt = error.attempt().unwrap();
            assert_eq!(attempt.tag, expected, "{code}");
            assert_eq!(attempt.data["error"], expected);
            assert_eq!(attempt.data["stream_name"], "orders");
            assert_eq!(attempt.data["partition_key"], "evt_1");
        }
    }

    #[tokio::test]
    async fn throughput_exceeded_is_retryable() {
        let connector = Arc::new(MockConnector {
            stream: Arc::new(MockStream {
                reject: Some("ProvisionedThroughputExceededException"),
                ..MockStream::default()
            }),
        });
        let publisher = provider(Arc::clone(&connector))
            .create_publisher(&destination())
            .unwrap();

        let error = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap_err();

        assert!(error.is_retryable());
    }
}
