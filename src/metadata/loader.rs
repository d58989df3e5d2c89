//! Loads provider metadata from bundled defaults and an optional override directory.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::embedded::{self, file};
use super::error::MetadataError;
use super::types::{CoreDocument, FieldSchema, ProviderMetadata, UiDocument};

/// Loads [`ProviderMetadata`] per destination type.
///
/// # Resolution
///
/// | document          | source                                   |
/// |-------------------|------------------------------------------|
/// | `core.json`       | bundled only                             |
/// | `validation.json` | bundled only                             |
/// | `ui.json`         | bundled, then non-empty override fields  |
/// | `instructions.md` | override if readable, else bundled       |
///
/// Overrides live at `<override_dir>/<type>/<document>`.
///
/// # Example
///
/// ```
/// use dest_registry::metadata::MetadataLoader;
///
/// let metadata = MetadataLoader::new().load("webhook").unwrap();
/// assert_eq!(metadata.provider_type, "webhook");
/// assert!(metadata.config_fields.iter().any(|f| f.key == "url"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataLoader {
    override_dir: Option<PathBuf>,
}

impl MetadataLoader {
    /// Creates a loader that only reads bundled defaults.
    #[must_use]
    pub const fn new() -> Self {
        Self { override_dir: None }
    }

    /// Creates a loader that checks `dir` before the bundled defaults.
    #[must_use]
    pub fn with_override_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: Some(dir.into()),
        }
    }

    /// Returns the override directory, if any.
    #[must_use]
    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }

    /// Loads and compiles the metadata for one provider type.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] when:
    /// - The type key is not a plain identifier ([`MetadataError::InvalidType`])
    /// - A required document exists nowhere ([`MetadataError::NotFound`])
    /// - A JSON document does not parse ([`MetadataError::Parse`])
    /// - The validation schema does not compile ([`MetadataError::Schema`])
    /// - A field pattern is not a valid regex ([`MetadataError::Pattern`])
    pub fn load(&self, provider_type: &str) -> Result<ProviderMetadata, MetadataError> {
        if !is_type_key(provider_type) {
            return Err(MetadataError::InvalidType(provider_type.to_string()));
        }

        let core: CoreDocument = parse(provider_type, file::CORE, bundled(provider_type, file::CORE)?)?;
        if core.provider_type != provider_type {
            return Err(MetadataError::TypeMismatch {
                provider: provider_type.to_string(),
                declared: core.provider_type,
            });
        }
        check_patterns(provider_type, &core.config_fields)?;
        check_patterns(provider_type, &core.credential_fields)?;

        let mut ui: UiDocument = parse(provider_type, file::UI, bundled(provider_type, file::UI)?)?;
        let ui_override = self.read_override(provider_type, file::UI);
        if let Some(content) = &ui_override {
            ui.merge(parse(provider_type, file::UI, content)?);
        }

        let instructions = match self.read_override(provider_type, file::INSTRUCTIONS) {
            Some(content) => content,
            None => bundled(provider_type, file::INSTRUCTIONS)?.to_string(),
        };

        let validation: serde_json::Value = parse(
            provider_type,
            file::VALIDATION,
            bundled(provider_type, file::VALIDATION)?,
        )?;
        let validator = jsonschema::options()
            .with_draft(jsonschema::Draft::Draft202012)
            .build(&validation)
            .map_err(|e| MetadataError::Schema {
                provider: provider_type.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            provider = provider_type,
            ui_override = ui_override.is_some(),
            "Loaded provider metadata"
        );

        Ok(ProviderMetadata::new(core, ui, instructions, validation, validator))
    }

    /// Reads an override document; absent or unreadable files yield `None`.
    fn read_override(&self, provider_type: &str, name: &str) -> Option<String> {
        let path = self.override_dir.as_ref()?.join(provider_type).join(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        "Ignoring unreadable metadata override '{}': {e}",
                        path.display()
                    );
                }
                None
            }
        }
    }
}

/// Plain identifiers only, so a type key can never escape the override directory.
fn is_type_key(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn bundled(provider_type: &str, name: &'static str) -> Result<&'static str, MetadataError> {
    embedded::document(provider_type, name).ok_or_else(|| MetadataError::NotFound {
        provider: provider_type.to_string(),
        file: name,
    })
}

fn parse<T: DeserializeOwned>(
    provider_type: &str,
    name: &'static str,
    content: &str,
) -> Result<T, MetadataError> {
    serde_json::from_str(content).map_err(|e| MetadataError::Parse {
        provider: provider_type.to_string(),
        file: name,
        source: e,
    })
}

fn check_patterns(provider_type: &str, fields: &[FieldSchema]) -> Result<(), MetadataError> {
    for field in fields {
        if let Some(pattern) = &field.pattern {
            regex::Regex::new(pattern).map_err(|e| MetadataError::Pattern {
                provider: provider_type.to_string(),
                field: field.key.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}
