//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::HeaderValue;
use http::header::HeaderName;

use crate::metadata::MetadataLoader;
use crate::provider::template_registry;
use crate::providers::webhook::{
    DEFAULT_HEADER_PREFIX, SignatureAlgorithm, SignatureEncoding, WebhookOptions,
};

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::{TomlConfig, WebhookSection};

/// Settings for the outbound HTTP client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: defaults::http_timeout(),
            user_agent: defaults::user_agent(),
        }
    }
}

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Metadata override directory (tilde expanded), if any
    pub metadata_path: Option<PathBuf>,

    /// Webhook provider options
    pub webhook: WebhookOptions,

    /// Outbound HTTP client settings
    pub http: HttpSettings,

    /// Deadline for one publish call
    pub publish_timeout: Duration,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata_str = self
            .metadata_path
            .as_ref()
            .map_or_else(|| "bundled".to_string(), |p| p.display().to_string());

        write!(
            f,
            "Config {{ metadata: {}, header_prefix: {}, signature: {}/{}, http_timeout: {}s, \
             publish_timeout: {}s }}",
            metadata_str,
            self.webhook.header_prefix,
            self.webhook.signature_algorithm,
            self.webhook.signature_encoding,
            self.http.timeout.as_secs(),
            self.publish_timeout.as_secs(),
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The metadata path exists but is not a directory
    /// - The header prefix does not form valid header names
    /// - A signature template does not compile
    /// - The signature encoding or algorithm is unknown
    /// - A duration is zero
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let metadata_path = Self::resolve_metadata_path(cli, toml)?;
        let webhook = Self::build_webhook_options(cli, toml)?;
        let http = Self::resolve_http(cli, toml)?;
        let publish_timeout = Self::resolve_publish_timeout(cli, toml)?;

        Ok(Self {
            metadata_path,
            webhook,
            http,
            publish_timeout,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    /// Returns a metadata loader honoring the override directory.
    #[must_use]
    pub fn metadata_loader(&self) -> MetadataLoader {
        self.metadata_path
            .as_ref()
            .map_or_else(MetadataLoader::new, |p| MetadataLoader::with_override_dir(p.clone()))
    }

    fn resolve_metadata_path(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Option<PathBuf>, ConfigError> {
        let Some(raw) = cli
            .metadata_path
            .as_deref()
            .or_else(|| toml.and_then(|t| t.metadata.path.as_deref()))
        else {
            return Ok(None);
        };

        let path = expand_tilde(raw);
        // A missing directory only means nothing is overridden.
        if path.exists() && !path.is_dir() {
            return Err(ConfigError::InvalidMetadataPath {
                path,
                reason: "not a directory".to_string(),
            });
        }
        Ok(Some(path))
    }

    fn build_webhook_options(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<WebhookOptions, ConfigError> {
        let default_section = WebhookSection::default();
        let section = toml.map_or(&default_section, |t| &t.webhook);

        // Priority: CLI explicit > TOML > default
        let prefix = cli
            .header_prefix
            .as_deref()
            .or(section.header_prefix.as_deref())
            .unwrap_or(DEFAULT_HEADER_PREFIX);
        validate_header_prefix(prefix)?;

        let content = non_empty(section.signature_content_template.as_deref());
        let header = non_empty(section.signature_header_template.as_deref());
        if let Some(template) = content {
            validate_template(field::CONTENT_TEMPLATE, template)?;
        }
        if let Some(template) = header {
            validate_template(field::HEADER_TEMPLATE, template)?;
        }

        let encoding = match section.signature_encoding.as_deref() {
            Some(value) => value
                .parse::<SignatureEncoding>()
                .map_err(|_| ConfigError::InvalidChoice {
                    field: field::ENCODING,
                    value: value.to_string(),
                    expected: "hex, base64",
                })?,
            None => SignatureEncoding::default(),
        };

        let algorithm = match section.signature_algorithm.as_deref() {
            Some(value) => value
                .parse::<SignatureAlgorithm>()
                .map_err(|_| ConfigError::InvalidChoice {
                    field: field::ALGORITHM,
                    value: value.to_string(),
                    expected: "hmac-sha256, hmac-sha1, hmac-md5",
                })?,
            None => SignatureAlgorithm::default(),
        };

        let mut options = WebhookOptions::default()
            .with_header_prefix(prefix)
            .with_signature_templates(content.map(String::from), header.map(String::from))
            .with_signature_encoding(encoding)
            .with_signature_algorithm(algorithm);
        options.disable_event_id_header = section.disable_event_id_header;
        options.disable_timestamp_header = section.disable_timestamp_header;
        options.disable_topic_header = section.disable_topic_header;
        options.disable_signature_header = section.disable_signature_header;
        Ok(options)
    }

    fn resolve_http(cli: &Cli, toml: Option<&TomlConfig>) -> Result<HttpSettings, ConfigError> {
        let http = toml.map(|t| &t.http);

        let seconds = cli
            .http_timeout
            .or_else(|| http.and_then(|h| h.timeout))
            .unwrap_or(defaults::HTTP_TIMEOUT_SECS);
        if seconds == 0 {
            return Err(ConfigError::zero_duration(field::HTTP_TIMEOUT));
        }

        let user_agent = http
            .and_then(|h| h.user_agent.clone())
            .unwrap_or_else(defaults::user_agent);
        HeaderValue::from_str(&user_agent).map_err(|e| ConfigError::InvalidUserAgent {
            value: user_agent.clone(),
            reason: e.to_string(),
        })?;

        Ok(HttpSettings {
            timeout: Duration::from_secs(seconds),
            user_agent,
        })
    }

    fn resolve_publish_timeout(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<Duration, ConfigError> {
        let seconds = cli
            .publish_timeout()
            .or_else(|| toml.and_then(|t| t.publish.timeout))
            .unwrap_or(defaults::PUBLISH_TIMEOUT_SECS);

        if seconds == 0 {
            return Err(ConfigError::zero_duration(field::PUBLISH_TIMEOUT));
        }

        Ok(Duration::from_secs(seconds))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

// Helper functions

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Expands a leading `~` to the home directory.
fn expand_tilde(raw: &str) -> PathBuf {
    let rest = if raw == "~" {
        Some("")
    } else {
        raw.strip_prefix("~/")
    };

    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

fn validate_header_prefix(prefix: &str) -> Result<(), ConfigError> {
    let probe = format!("{prefix}event-id");
    HeaderName::from_bytes(probe.to_ascii_lowercase().as_bytes())
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidHeaderPrefix {
            prefix: prefix.to_string(),
            reason: e.to_string(),
        })
}

fn validate_template(field: &'static str, template: &str) -> Result<(), ConfigError> {
    let mut registry = template_registry();
    registry
        .register_template_string(field, template)
        .map_err(|e| ConfigError::InvalidTemplate {
            field,
            reason: e.to_string(),
        })
}
