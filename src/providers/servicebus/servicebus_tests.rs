//! Tests for the Service Bus provider and publisher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use serde_json::json;

use super::*;
use crate::models::DeliveryStatus;
use crate::time::FixedClock;
use crate::transport::TransportError;

const CONNECTION_STRING: &str =
    "Endpoint=sb://acme.servicebus.windows.net/;SharedAccessKeyName=send;SharedAccessKey=c2VjcmV0a2V5";

#[derive(Debug, Default)]
struct MockSender {
    sent: Mutex<Vec<ServiceBusMessage>>,
    closes: AtomicUsize,
    reject: bool,
}

#[async_trait]
impl ServiceBusSender for MockSender {
    async fn send_message(&self, message: ServiceBusMessage) -> Result<(), TransportError> {
        if self.reject {
            return Err(TransportError::rejected("MessagingEntityNotFound", "no such queue"));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockConnector {
    sender: Arc<MockSender>,
    configs: Mutex<Vec<ServiceBusConfig>>,
}

impl ServiceBusConnector for MockConnector {
    fn connect(
        &self,
        config: &ServiceBusConfig,
    ) -> Result<Arc<dyn ServiceBusSender>, TransportError> {
        self.configs.lock().unwrap().push(config.clone());
        Ok(Arc::clone(&self.sender) as Arc<dyn ServiceBusSender>)
    }
}

fn provider(connector: Arc<MockConnector>) -> ServiceBusProvider {
    ServiceBusProvider::new(&MetadataLoader::new(), connector)
        .unwrap()
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
        )))
}

fn destination() -> Destination {
    Destination::new("des_1", "azure_servicebus")
        .with_config("name", "orders")
        .with_credential("connection_string", CONNECTION_STRING)
}

fn event() -> Event {
    Event::new("evt_1", "order.created", json!({"total": 42})).with_metadata("region", "eu")
}

mod validate {
    use super::*;

    #[test]
    fn resolves_entity_and_connection_string() {
        let provider = provider(Arc::new(MockConnector::default()));

        let config = provider.resolve(&destination()).unwrap();

        assert_eq!(config.entity, "orders");
        assert_eq!(config.connection_string, CONNECTION_STRING);
    }

    #[test]
    fn missing_fields_are_required() {
        let provider = provider(Arc::new(MockConnector::default()));

        let error = provider
            .validate(&Destination::new("des_1", "azure_servicebus"))
            .unwrap_err();

        assert!(error.contains("config.name", "required"), "{error}");
        assert!(error.contains("credentials.connection_string", "required"), "{error}");
    }

    #[test]
    fn connection_string_needs_endpoint() {
        let provider = provider(Arc::new(MockConnector::default()));

        let error = provider
            .validate(&destination().with_credential("connection_string", "SharedAccessKey=abc"))
            .unwrap_err();

        assert!(error.contains("credentials.connection_string", "format"), "{error}");
    }

    #[test]
    fn target_prefixes_namespace() {
        let provider = provider(Arc::new(MockConnector::default()));

        assert_eq!(provider.compute_target(&destination()).target, "acme/orders");

        let no_namespace = destination().with_credential("connection_string", "garbage");
        assert_eq!(provider.compute_target(&no_namespace).target, "orders");
    }

    #[test]
    fn obfuscation_masks_connection_string() {
        let provider = provider(Arc::new(MockConnector::default()));

        let masked = provider.obfuscate_destination(&destination());

        assert!(masked.credentials["connection_string"].starts_with("Endp*"));
        assert!(!masked.credentials["connection_string"].contains("c2VjcmV0a2V5"));
        assert_eq!(masked.config["name"], "orders");
    }
}

mod publish {
    use super::*;

    #[tokio::test]
    async fn sends_data_body_and_metadata_properties() {
        let connector = Arc::new(MockConnector::default());
        let publisher = provider(Arc::clone(&connector))
            .create_publisher(&destination())
            .unwrap();

        let delivery = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap();

        assert_eq!(delivery.status, DeliveryStatus::Success);
        assert_eq!(delivery.code, "OK");
        assert_eq!(connector.configs.lock().unwrap()[0].entity, "orders");

        let sent = connector.sender.sent.lock().unwrap();
        assert_eq!(sent[0].body, br#"{"total":42}"#);
        assert_eq!(sent[0].properties["event-id"], "evt_1");
        assert_eq!(sent[0].properties["topic"], "order.created");
        assert_eq!(sent[0].properties["timestamp"], "1736937000000");
        assert_eq!(sent[0].properties["region"], "eu");
    }

    #[tokio::test]
    async fn rejection_is_failed_delivery() {
        let connector = Arc::new(MockConnector {
            sender: Arc::new(MockSender {
                reject: true,
                ..MockSender::default()
            }),
            ..MockConnector::default()
        });
        let publisher = provider(connector).create_publisher(&destination()).unwrap();

        let error = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap_err();

        let attempt = error.attempt().unwrap();
        assert_eq!(attempt.provider, "azure_servicebus");
        assert_eq!(attempt.tag, tag::REJECTED);
        assert_eq!(error.delivery().unwrap().status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn close_releases_sender_once() {
        let connector = Arc::new(MockConnector::default());
        let publisher = provider(Arc::clone(&connector))
            .create_publisher(&destination())
            .unwrap();

        publisher.close().await.unwrap();
        publisher.close().await.unwrap();
        let error = publisher
            .publish(&CallContext::background(), &event())
            .await
            .unwrap_err();

        assert!(error.is_closed());
        assert_eq!(connector.sender.closes.load(Ordering::SeqCst), 1);
        assert!(connector.sender.sent.lock().unwrap().is_empty());
    }
}
