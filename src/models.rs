//! Domain types shared by providers, publishers and the registry.
//!
//! - [`Destination`]: a configured delivery target of one provider type
//! - [`Event`]: the immutable unit handed to a publisher
//! - [`Delivery`]: the outcome of one publish attempt
//! - [`DestinationTarget`]: the human-readable display of a destination

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// String-to-string mapping used for config, credentials and metadata.
///
/// Ordered so that headers, attributes and fingerprints are deterministic.
pub type StringMap = BTreeMap<String, String>;

/// A configured delivery target.
///
/// Owned by the storage layer. Providers only read it, except during
/// preprocessing where `config` and `credentials` may be enriched.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Destination identifier.
    pub id: String,

    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: String,

    /// Provider type key (e.g. `webhook`).
    #[serde(rename = "type")]
    pub destination_type: String,

    /// Topics this destination subscribes to.
    #[serde(default)]
    pub topics: Vec<String>,

    /// Non-secret settings.
    #[serde(default)]
    pub config: StringMap,

    /// Secret settings. Values may be JSON-encoded structured data.
    #[serde(default)]
    pub credentials: StringMap,

    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Set when the destination has been disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<DateTime<Utc>>,
}

impl Destination {
    /// Creates a destination with empty config and credentials.
    #[must_use]
    pub fn new(id: impl Into<String>, destination_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: String::new(),
            destination_type: destination_type.into(),
            topics: vec!["*".to_string()],
            config: StringMap::new(),
            credentials: StringMap::new(),
            created_at: Utc::now(),
            disabled_at: None,
        }
    }

    /// Sets the owning tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Replaces the subscribed topics.
    #[must_use]
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    /// Sets one config entry.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Sets one credential entry.
    #[must_use]
    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    /// Returns a non-empty config value.
    #[must_use]
    pub fn config_value(&self, key: &str) -> Option<&str> {
        non_empty(&self.config, key)
    }

    /// Returns a non-empty credential value.
    #[must_use]
    pub fn credential_value(&self, key: &str) -> Option<&str> {
        non_empty(&self.credentials, key)
    }
}

fn non_empty<'a>(map: &'a StringMap, key: &str) -> Option<&'a str> {
    map.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

// Credential values are never printed; only their keys.
impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("destination_type", &self.destination_type)
            .field("topics", &self.topics)
            .field("config", &self.config)
            .field("credentials", &self.credentials.keys().collect::<Vec<_>>())
            .field("created_at", &self.created_at)
            .field("disabled_at", &self.disabled_at)
            .finish()
    }
}

/// An event to deliver.
///
/// Immutable once handed to a publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: String,

    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: String,

    /// Destination the event is being delivered to.
    #[serde(default)]
    pub destination_id: String,

    /// Event topic.
    #[serde(default)]
    pub topic: String,

    /// Event timestamp.
    #[serde(default = "Utc::now")]
    pub time: DateTime<Utc>,

    /// User-supplied key/value metadata.
    #[serde(default)]
    pub metadata: StringMap,

    /// Arbitrary JSON payload.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Event {
    /// Creates an event with the current time and no metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, topic: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            tenant_id: String::new(),
            destination_id: String::new(),
            topic: topic.into(),
            time: Utc::now(),
            metadata: StringMap::new(),
            data,
        }
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the event timestamp.
    #[must_use]
    pub const fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }
}

/// Outcome status of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The destination acknowledged the event.
    Success,
    /// The destination rejected the event.
    Failed,
    /// The outcome is unknown (e.g. the request timed out after sending).
    Uncertain,
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Uncertain => "uncertain",
        };
        f.write_str(s)
    }
}

/// Structured outcome of one publish attempt.
///
/// `response` is for observability only and never drives control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    /// Outcome status.
    pub status: DeliveryStatus,
    /// Protocol status code as text (e.g. `"200"`, `"OK"`).
    pub code: String,
    /// Free-form response payload.
    #[serde(default)]
    pub response: serde_json::Value,
}

impl Delivery {
    /// Creates a successful delivery.
    #[must_use]
    pub fn success(code: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            status: DeliveryStatus::Success,
            code: code.into(),
            response,
        }
    }

    /// Creates a failed delivery.
    #[must_use]
    pub fn failed(code: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            status: DeliveryStatus::Failed,
            code: code.into(),
            response,
        }
    }

    /// Creates a delivery whose outcome is unknown.
    #[must_use]
    pub fn uncertain(code: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            status: DeliveryStatus::Uncertain,
            code: code.into(),
            response,
        }
    }

    /// Returns true if the destination acknowledged the event.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Human-readable display of where a destination delivers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationTarget {
    /// Short description (URL, queue name, bucket...).
    pub target: String,
    /// Console or dashboard link, when one can be derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

impl DestinationTarget {
    /// Creates a target without a link.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            target_url: None,
        }
    }

    /// Sets the link.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod destination {
        use super::*;

        #[test]
        fn deserializes_type_field() {
            let json = r#"{"id":"des_1","type":"webhook","config":{"url":"https://example.com"}}"#;
            let destination: Destination = serde_json::from_str(json).unwrap();

            assert_eq!(destination.destination_type, "webhook");
            assert_eq!(destination.config_value("url"), Some("https://example.com"));
            assert!(destination.credentials.is_empty());
        }

        #[test]
        fn empty_values_are_treated_as_absent() {
            let destination = Destination::new("des_1", "webhook")
                .with_config("url", "")
                .with_credential("secret", "");

            assert_eq!(destination.config_value("url"), None);
            assert_eq!(destination.credential_value("secret"), None);
        }

        #[test]
        fn debug_hides_credential_values() {
            let destination =
                Destination::new("des_1", "webhook").with_credential("secret", "super-secret-value");
            let debug = format!("{destination:?}");

            assert!(debug.contains("secret"));
            assert!(!debug.contains("super-secret-value"));
        }
    }

    mod delivery {
        use super::*;

        #[test]
        fn status_serializes_lowercase() {
            let delivery = Delivery::success("200", serde_json::json!({"ok": true}));
            let json = serde_json::to_value(&delivery).unwrap();

            assert_eq!(json["status"], "success");
            assert_eq!(json["code"], "200");
        }

        #[test]
        fn failed_is_not_success() {
            let delivery = Delivery::failed("500", serde_json::Value::Null);
            assert!(!delivery.is_success());
            assert_eq!(delivery.status.to_string(), "failed");
        }
    }

    #[test]
    fn target_omits_missing_url() {
        let target = DestinationTarget::new("https://example.com/hook");
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, r#"{"target":"https://example.com/hook"}"#);
    }
}
