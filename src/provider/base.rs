//! Schema validation and obfuscation shared by every provider.

use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::paths::{Location, LocationSegment};
use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorDetail};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Destination, StringMap};

/// Values shorter than this are fully masked.
const MASK_THRESHOLD: usize = 10;

/// Leading characters kept visible for longer values.
const VISIBLE_PREFIX: usize = 4;

/// Masks a sensitive value for display.
///
/// Values under 10 characters become `****` regardless of length. Longer
/// values keep their first 4 characters and mask the rest one-for-one.
///
/// ```
/// use dest_registry::provider::obfuscate_value;
///
/// assert_eq!(obfuscate_value("short"), "****");
/// assert_eq!(obfuscate_value("abcdefghij"), "abcd******");
/// ```
#[must_use]
pub fn obfuscate_value(value: &str) -> String {
    let len = value.chars().count();
    if len < MASK_THRESHOLD {
        return "****".to_string();
    }
    let mut masked: String = value.chars().take(VISIBLE_PREFIX).collect();
    masked.push_str(&"*".repeat(len - VISIBLE_PREFIX));
    masked
}

/// Validation and obfuscation driven by a provider's metadata.
///
/// Concrete providers hold one and delegate to it before running their own
/// protocol-specific checks.
#[derive(Debug, Clone)]
pub struct BaseProvider {
    metadata: Arc<ProviderMetadata>,
}

impl BaseProvider {
    /// Loads the metadata for `provider_type`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor is missing or corrupt.
    pub fn new(loader: &MetadataLoader, provider_type: &str) -> Result<Self, MetadataError> {
        Ok(Self::from_metadata(loader.load(provider_type)?))
    }

    /// Wraps already-loaded metadata.
    #[must_use]
    pub fn from_metadata(metadata: ProviderMetadata) -> Self {
        Self {
            metadata: Arc::new(metadata),
        }
    }

    /// Returns the provider metadata.
    #[must_use]
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    /// Checks the destination type, then the JSON Schema.
    ///
    /// The schema sees `{"config": {...}, "credentials": {...}}`; empty
    /// values are treated as absent so they report as `required`.
    ///
    /// # Errors
    ///
    /// Returns a single `type`/`invalid_type` detail on a type mismatch,
    /// otherwise one detail per schema violation.
    pub fn validate(&self, destination: &Destination) -> Result<(), ValidationError> {
        if destination.destination_type != self.metadata.provider_type {
            return Err(ValidationError::single("type", "invalid_type"));
        }

        let instance = schema_instance(destination);
        let validator = self.metadata.validator();

        let mut details = Vec::new();
        for error in validator.iter_errors(&instance) {
            flatten(&error, &mut details);
        }

        if details.is_empty() && !validator.is_valid(&instance) {
            details.push(ValidationErrorDetail::new("root", "unknown"));
        }

        ValidationError::check(details)
    }

    /// Returns a copy with every sensitive config and credential value masked.
    #[must_use]
    pub fn obfuscate_destination(&self, destination: &Destination) -> Destination {
        let mut result = destination.clone();
        for (key, value) in &mut result.config {
            if self.metadata.is_sensitive_config(key) {
                *value = obfuscate_value(value);
            }
        }
        for (key, value) in &mut result.credentials {
            if self.metadata.is_sensitive_credential(key) {
                *value = obfuscate_value(value);
            }
        }
        result
    }
}

fn schema_instance(destination: &Destination) -> Value {
    let mut root = Map::new();
    root.insert("config".to_string(), present_values(&destination.config));
    root.insert(
        "credentials".to_string(),
        present_values(&destination.credentials),
    );
    Value::Object(root)
}

fn present_values(map: &StringMap) -> Value {
    Value::Object(
        map.iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Flattens one schema error (and its nested causes) into details.
fn flatten(error: &jsonschema::ValidationError<'_>, out: &mut Vec<ValidationErrorDetail>) {
    match error.kind() {
        ValidationErrorKind::Required { property } => {
            let parent = dotted(error.instance_path());
            let name = property
                .as_str()
                .map_or_else(|| property.to_string(), ToString::to_string);
            let field = if parent.is_empty() {
                name
            } else {
                format!("{parent}.{name}")
            };
            out.push(ValidationErrorDetail::new(field, "required"));
        }
        ValidationErrorKind::AnyOf { context } | ValidationErrorKind::OneOfNotValid { context } => {
            let before = out.len();
            for cause in context.iter().flatten() {
                flatten(cause, out);
            }
            if out.len() == before {
                out.push(at_node(error));
            }
        }
        _ => out.push(at_node(error)),
    }
}

fn at_node(error: &jsonschema::ValidationError<'_>) -> ValidationErrorDetail {
    let path = dotted(error.instance_path());
    let field = if path.is_empty() {
        "root".to_string()
    } else {
        path
    };
    let kind = match error.schema_path().iter().last() {
        Some(LocationSegment::Property(keyword)) => keyword.into_owned(),
        _ => error.kind().keyword().to_string(),
    };
    ValidationErrorDetail::new(field, kind)
}

fn dotted(location: &Location) -> String {
    location
        .iter()
        .map(|segment| segment.to_string())
        .collect::<Vec<_>>()
        .join(".")
}
