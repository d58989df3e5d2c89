//! Error types for configuration parsing and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration operations.
///
/// Covers errors from parsing, validation, and file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write configuration file (for init command).
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The metadata override path does not name a directory.
    #[error("Invalid metadata path '{}': {reason}", path.display())]
    InvalidMetadataPath {
        /// The configured path after tilde expansion
        path: PathBuf,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid duration value (zero or too large).
    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid header prefix.
    #[error("Invalid header prefix '{prefix}': {reason}")]
    InvalidHeaderPrefix {
        /// The invalid prefix
        prefix: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid `User-Agent` value.
    #[error("Invalid user agent '{value}': {reason}")]
    InvalidUserAgent {
        /// The invalid value
        value: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid signature template (Handlebars syntax error).
    #[error("Invalid {field} template: {reason}")]
    InvalidTemplate {
        /// Which template
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Unknown signature encoding or algorithm.
    #[error("Invalid {field} '{value}': expected one of {expected}")]
    InvalidChoice {
        /// Name of the field
        field: &'static str,
        /// The invalid value
        value: String,
        /// Accepted values
        expected: &'static str,
    },
}

/// Well-known field names for configuration errors.
///
/// Use these constants for compile-time safety when matching field names.
pub mod field {
    /// The signature content template.
    pub const CONTENT_TEMPLATE: &str = "webhook.signature_content_template";
    /// The signature header template.
    pub const HEADER_TEMPLATE: &str = "webhook.signature_header_template";
    /// The signature encoding.
    pub const ENCODING: &str = "webhook.signature_encoding";
    /// The signature algorithm.
    pub const ALGORITHM: &str = "webhook.signature_algorithm";
    /// The HTTP client timeout.
    pub const HTTP_TIMEOUT: &str = "http.timeout";
    /// The publish deadline.
    pub const PUBLISH_TIMEOUT: &str = "publish.timeout";
}

impl ConfigError {
    /// Creates an `InvalidDuration` error for a zero value.
    #[must_use]
    pub fn zero_duration(field: &'static str) -> Self {
        Self::InvalidDuration {
            field,
            reason: "must be greater than 0".to_string(),
        }
    }
}
