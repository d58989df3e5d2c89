//! Provider descriptor types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Schema of one config or credential field.
///
/// The optional hints (`min`, `pattern`, ...) are for form rendering;
/// validation itself is driven by the provider's JSON Schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Map key in `config` or `credentials`.
    pub key: String,
    /// Input type (`text`, `checkbox`, `number`, ...).
    #[serde(rename = "type")]
    pub field_type: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Help text.
    #[serde(default)]
    pub description: String,
    /// Whether the field must be present.
    #[serde(default)]
    pub required: bool,
    /// Whether the value must be masked outside the sending path.
    #[serde(default, skip_serializing_if = "is_false")]
    pub sensitive: bool,
    /// Minimum for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    /// Maximum for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    /// Step for numeric fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    /// Minimum length for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minlength: Option<u32>,
    /// Maximum length for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxlength: Option<u32>,
    /// Regular expression for text fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if signature
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Contents of `core.json`. Authoritative, never overridden.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CoreDocument {
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub config_fields: Vec<FieldSchema>,
    #[serde(default)]
    pub credential_fields: Vec<FieldSchema>,
}

/// Contents of `ui.json`. Overridable field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UiDocument {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub remote_setup_url: Option<String>,
}

impl UiDocument {
    /// Replaces every field the override sets to a non-empty value.
    pub fn merge(&mut self, other: Self) {
        if !other.label.is_empty() {
            self.label = other.label;
        }
        if !other.description.is_empty() {
            self.description = other.description;
        }
        if !other.icon.is_empty() {
            self.icon = other.icon;
        }
        if let Some(url) = other.remote_setup_url.filter(|u| !u.is_empty()) {
            self.remote_setup_url = Some(url);
        }
    }
}

/// Descriptor of one destination type.
///
/// Loaded once when the provider is constructed and read-only afterwards.
/// Serializes to the shape served to UI clients (the compiled validator is
/// skipped).
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetadata {
    /// Type key.
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Ordered config field schemas.
    pub config_fields: Vec<FieldSchema>,
    /// Ordered credential field schemas.
    pub credential_fields: Vec<FieldSchema>,
    /// Display label.
    pub label: String,
    /// Display description.
    pub description: String,
    /// Icon identifier.
    pub icon: String,
    /// Link to set up the remote side, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_setup_url: Option<String>,
    /// Free-text setup instructions (Markdown).
    pub instructions: String,
    /// JSON Schema document for `{config, credentials}`.
    #[serde(skip)]
    pub validation: serde_json::Value,
    #[serde(skip)]
    validator: Arc<jsonschema::Validator>,
}

impl ProviderMetadata {
    pub(crate) fn new(
        core: CoreDocument,
        ui: UiDocument,
        instructions: String,
        validation: serde_json::Value,
        validator: jsonschema::Validator,
    ) -> Self {
        Self {
            provider_type: core.provider_type,
            config_fields: core.config_fields,
            credential_fields: core.credential_fields,
            label: ui.label,
            description: ui.description,
            icon: ui.icon,
            remote_setup_url: ui.remote_setup_url,
            instructions,
            validation,
            validator: Arc::new(validator),
        }
    }

    /// Returns the compiled validation schema.
    #[must_use]
    pub fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }

    /// Returns true if the config field is marked sensitive.
    #[must_use]
    pub fn is_sensitive_config(&self, key: &str) -> bool {
        self.config_fields
            .iter()
            .any(|field| field.key == key && field.sensitive)
    }

    /// Returns true if the credential field is marked sensitive.
    #[must_use]
    pub fn is_sensitive_credential(&self, key: &str) -> bool {
        self.credential_fields
            .iter()
            .any(|field| field.key == key && field.sensitive)
    }
}
