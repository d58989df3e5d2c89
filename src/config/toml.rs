//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Provider metadata section
    #[serde(default)]
    pub metadata: MetadataSection,

    /// Webhook provider section
    #[serde(default)]
    pub webhook: WebhookSection,

    /// Outbound HTTP client section
    #[serde(default)]
    pub http: HttpSection,

    /// Publish section
    #[serde(default)]
    pub publish: PublishSection,
}

/// Provider metadata section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataSection {
    /// Directory with per-provider `ui.json`/`instructions.md` overrides
    pub path: Option<String>,
}

/// Webhook provider section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[allow(clippy::struct_excessive_bools)] // one switch per optional header
pub struct WebhookSection {
    /// Prefix for system and metadata headers
    pub header_prefix: Option<String>,

    /// Omit the event id header
    #[serde(default)]
    pub disable_event_id_header: bool,

    /// Omit the timestamp header
    #[serde(default)]
    pub disable_timestamp_header: bool,

    /// Omit the topic header
    #[serde(default)]
    pub disable_topic_header: bool,

    /// Omit the signature header
    #[serde(default)]
    pub disable_signature_header: bool,

    /// Handlebars template for the signed content
    pub signature_content_template: Option<String>,

    /// Handlebars template for the signature header value
    pub signature_header_template: Option<String>,

    /// `hex` or `base64`
    pub signature_encoding: Option<String>,

    /// `hmac-sha256`, `hmac-sha1` or `hmac-md5`
    pub signature_algorithm: Option<String>,
}

/// Outbound HTTP client section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpSection {
    /// Client timeout in seconds
    pub timeout: Option<u64>,

    /// `User-Agent` header value
    pub user_agent: Option<String>,
}

/// Publish section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSection {
    /// Per-call deadline in seconds
    pub timeout: Option<u64>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# dest-registry configuration file

[metadata]
# Directory with per-provider overrides (<dir>/<type>/ui.json, instructions.md).
# Field schemas always come from the built-in metadata.
# path = "~/.config/dest-registry/metadata"

[webhook]
# Prefix for system and metadata headers (default: "x-outpost-")
# header_prefix = "x-outpost-"

# Omit individual system headers
# disable_event_id_header = false
# disable_timestamp_header = false
# disable_topic_header = false
# disable_signature_header = false

# Handlebars templates for signing
# Content variables: {{timestamp}}, {{body}}, {{event_id}}, {{topic}}
# Header variables: {{timestamp}}, {{signatures}}, {{event_id}}, {{topic}}
# signature_content_template = "{{timestamp}}.{{body}}"
# signature_header_template = "t={{timestamp}},v0={{join signatures \",\"}}"

# Signature encoding: "hex" or "base64" (default: hex)
# signature_encoding = "hex"

# HMAC algorithm: "hmac-sha256", "hmac-sha1" or "hmac-md5" (default: hmac-sha256)
# signature_algorithm = "hmac-sha256"

[http]
# Outbound request timeout in seconds (default: 30)
# timeout = 30

# User-Agent header (default: dest-registry/<version>)
# user_agent = "dest-registry"

[publish]
# Deadline for one publish call in seconds (default: 30)
# timeout = 30
"#
    .to_string()
}
