//! Wire formatting helpers shared by publishers.

use chrono::{DateTime, Utc};
use handlebars::{Handlebars, RenderError, TemplateError, handlebars_helper};
use serde::Serialize;
use serde_json::Value;

use crate::models::{Event, StringMap};

const TEMPLATE_NAME: &str = "template";

handlebars_helper!(join: |list: array, sep: str| {
    list.iter()
        .map(|item| match item {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
});

/// Creates a template registry with escaping disabled and the `join` helper.
pub(crate) fn template_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    registry.register_helper("join", Box::new(join));
    registry
}

/// Builds the system metadata attached to every published event.
///
/// Contains `timestamp` (unix millis), `event-id` and `topic`, overlaid by
/// the event's own metadata.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use dest_registry::models::Event;
/// use dest_registry::provider::make_metadata;
///
/// let event = Event::new("evt_1", "user.created", serde_json::json!({}))
///     .with_metadata("source", "api");
/// let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
///
/// let metadata = make_metadata(&event, at);
/// assert_eq!(metadata["timestamp"], "1700000000123");
/// assert_eq!(metadata["event-id"], "evt_1");
/// assert_eq!(metadata["source"], "api");
/// ```
#[must_use]
pub fn make_metadata(event: &Event, timestamp: DateTime<Utc>) -> StringMap {
    let mut metadata = StringMap::new();
    metadata.insert(
        "timestamp".to_string(),
        timestamp.timestamp_millis().to_string(),
    );
    metadata.insert("event-id".to_string(), event.id.clone());
    metadata.insert("topic".to_string(), event.topic.clone());
    for (key, value) in &event.metadata {
        metadata.insert(key.clone(), value.clone());
    }
    metadata
}

#[derive(Debug, Clone)]
enum Compiled {
    Empty,
    Ready(Box<Handlebars<'static>>),
    Invalid(String),
}

/// A handlebars template used to derive keys (partition keys, object keys).
///
/// Escaping is disabled. Missing and null values render as empty strings.
#[derive(Debug, Clone)]
pub struct KeyTemplate {
    source: String,
    compiled: Compiled,
}

impl KeyTemplate {
    /// Compiles a template, failing on invalid syntax.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the template does not parse.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        if source.trim().is_empty() {
            return Ok(Self::empty());
        }
        let mut registry = template_registry();
        registry.register_template_string(TEMPLATE_NAME, source)?;
        Ok(Self {
            source: source.to_string(),
            compiled: Compiled::Ready(Box::new(registry)),
        })
    }

    /// Compiles a template, keeping syntax errors for render time.
    ///
    /// An invalid template never renders; [`partition_key`](Self::partition_key)
    /// falls back to the event id.
    #[must_use]
    pub fn lenient(source: &str) -> Self {
        Self::parse(source).unwrap_or_else(|e| Self {
            source: source.to_string(),
            compiled: Compiled::Invalid(e.to_string()),
        })
    }

    /// A template that renders nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            source: String::new(),
            compiled: Compiled::Empty,
        }
    }

    /// Returns the template source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if no template was configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self.compiled, Compiled::Empty)
    }

    /// Renders the template against `data`.
    ///
    /// An empty template renders to an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the template is invalid or rendering fails.
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String, RenderError> {
        match &self.compiled {
            Compiled::Empty => Ok(String::new()),
            Compiled::Ready(registry) => registry.render(TEMPLATE_NAME, data),
            Compiled::Invalid(reason) => Err(RenderError::from(
                handlebars::RenderErrorReason::Other(reason.clone()),
            )),
        }
    }

    /// Derives a partition key for `event` from `{metadata, data}`.
    ///
    /// Falls back to the event id when the template is empty, renders to an
    /// empty string or fails. Never fails.
    #[must_use]
    pub fn partition_key(&self, event: &Event) -> String {
        self.partition_key_with(event, &event.metadata)
    }

    /// Like [`partition_key`](Self::partition_key), with `metadata` in place
    /// of the event's own (e.g. the output of [`make_metadata`]).
    #[must_use]
    pub fn partition_key_with(&self, event: &Event, metadata: &StringMap) -> String {
        if self.is_empty() {
            return event.id.clone();
        }

        #[derive(Serialize)]
        struct KeyContext<'a> {
            metadata: &'a StringMap,
            data: &'a Value,
        }

        let context = KeyContext {
            metadata,
            data: &event.data,
        };
        match self.render(&context) {
            Ok(key) if !key.is_empty() => key,
            Ok(_) => {
                tracing::warn!(
                    event_id = %event.id,
                    "Partition key template rendered empty, using event id"
                );
                event.id.clone()
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.id,
                    "Partition key template failed, using event id: {e}"
                );
                event.id.clone()
            }
        }
    }
}

impl Default for KeyTemplate {
    fn default() -> Self {
        Self::empty()
    }
}
