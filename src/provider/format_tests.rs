//! Tests for system metadata and key templates.

use chrono::{TimeZone, Utc};
use serde_json::json;

use super::*;
use crate::models::Event;

fn event() -> Event {
    Event::new("evt_123", "order.created", json!({"customer_id": "cus_9", "total": 42, "note": null}))
        .with_metadata("region", "eu")
}

mod metadata {
    use super::*;

    #[test]
    fn contains_system_fields() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let metadata = make_metadata(&event(), at);

        assert_eq!(metadata["timestamp"], "1700000000123");
        assert_eq!(metadata["event-id"], "evt_123");
        assert_eq!(metadata["topic"], "order.created");
        assert_eq!(metadata["region"], "eu");
    }

    #[test]
    fn event_metadata_overrides_system_fields() {
        let event = event().with_metadata("topic", "custom");

        let metadata = make_metadata(&event, Utc::now());

        assert_eq!(metadata["topic"], "custom");
    }
}

mod key_template {
    use super::*;

    #[test]
    fn renders_from_data_and_metadata() {
        let template = KeyTemplate::parse("{{metadata.region}}-{{data.customer_id}}").unwrap();

        assert_eq!(template.partition_key(&event()), "eu-cus_9");
    }

    #[test]
    fn escaping_is_disabled() {
        let template = KeyTemplate::parse("{{data.html}}").unwrap();
        let event = Event::new("evt_1", "t", json!({"html": "<a&b>"}));

        assert_eq!(template.partition_key(&event), "<a&b>");
    }

    #[test]
    fn empty_template_uses_event_id() {
        assert_eq!(KeyTemplate::empty().partition_key(&event()), "evt_123");
        assert_eq!(KeyTemplate::parse("   ").unwrap().partition_key(&event()), "evt_123");
    }

    #[test]
    fn missing_value_uses_event_id() {
        let template = KeyTemplate::parse("{{data.missing}}").unwrap();

        assert_eq!(template.partition_key(&event()), "evt_123");
    }

    #[test]
    fn null_value_uses_event_id() {
        let template = KeyTemplate::parse("{{data.note}}").unwrap();

        assert_eq!(template.partition_key(&event()), "evt_123");
    }

    #[test]
    fn invalid_template_uses_event_id() {
        let template = KeyTemplate::lenient("{{#if}}");

        assert!(!template.is_empty());
        assert_eq!(template.partition_key(&event()), "evt_123");
        assert!(template.render(&json!({})).is_err());
    }

    #[test]
    fn strict_parse_rejects_invalid_syntax() {
        assert!(KeyTemplate::parse("{{#each data}}").is_err());
        assert!(KeyTemplate::parse("{{data.id}}").is_ok());
    }

    #[test]
    fn join_helper_is_available() {
        let template = KeyTemplate::parse("{{join data.parts \"/\"}}").unwrap();

        let rendered = template.render(&json!({"data": {"parts": ["a", "b", 3]}})).unwrap();

        assert_eq!(rendered, "a/b/3");
    }
}
