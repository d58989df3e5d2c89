//! Error types for metadata loading.

use thiserror::Error;

/// Error type for metadata loading.
///
/// Metadata failures are fatal at provider construction: a provider with a
/// missing or corrupt descriptor is never registered.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The provider type key is not a plain identifier.
    #[error("Invalid provider type '{0}'")]
    InvalidType(String),

    /// Neither the override directory nor the bundled defaults have the file.
    #[error("Metadata file '{file}' not found for provider '{provider}'")]
    NotFound {
        /// Provider type key
        provider: String,
        /// Document name
        file: &'static str,
    },

    /// A JSON document failed to parse.
    #[error("Failed to parse '{file}' for provider '{provider}': {source}")]
    Parse {
        /// Provider type key
        provider: String,
        /// Document name
        file: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The validation schema does not compile.
    #[error("Invalid validation schema for provider '{provider}': {reason}")]
    Schema {
        /// Provider type key
        provider: String,
        /// Compiler message
        reason: String,
    },

    /// A field schema carries a pattern that is not a valid regular expression.
    #[error("Invalid pattern for field '{field}' of provider '{provider}': {source}")]
    Pattern {
        /// Provider type key
        provider: String,
        /// Field key
        field: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// `core.json` describes a different provider type than requested.
    #[error("Metadata for '{provider}' declares type '{declared}'")]
    TypeMismatch {
        /// Requested provider type key
        provider: String,
        /// Type found in `core.json`
        declared: String,
    },
}
