//! Provider-wide webhook settings.

use super::signature::{SignatureAlgorithm, SignatureEncoding};

/// Default prefix for every header the webhook publisher sets.
pub const DEFAULT_HEADER_PREFIX: &str = "x-outpost-";

/// Settings shared by every webhook destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOptions {
    /// Prefix for system and metadata headers.
    pub header_prefix: String,
    /// Omit `{prefix}event-id`.
    pub disable_event_id_header: bool,
    /// Omit `{prefix}timestamp`.
    pub disable_timestamp_header: bool,
    /// Omit `{prefix}topic`.
    pub disable_topic_header: bool,
    /// Omit `{prefix}signature`.
    pub disable_signature_header: bool,
    /// Signing-string template; the default when `None`.
    pub signature_content_template: Option<String>,
    /// Signature header template; the default when `None`.
    pub signature_header_template: Option<String>,
    /// Signature encoding.
    pub signature_encoding: SignatureEncoding,
    /// HMAC algorithm.
    pub signature_algorithm: SignatureAlgorithm,
}

impl Default for WebhookOptions {
    fn default() -> Self {
        Self {
            header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
            disable_event_id_header: false,
            disable_timestamp_header: false,
            disable_topic_header: false,
            disable_signature_header: false,
            signature_content_template: None,
            signature_header_template: None,
            signature_encoding: SignatureEncoding::default(),
            signature_algorithm: SignatureAlgorithm::default(),
        }
    }
}

impl WebhookOptions {
    /// Sets the header prefix.
    #[must_use]
    pub fn with_header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.header_prefix = prefix.into().to_ascii_lowercase();
        self
    }

    /// Sets the signature templates.
    #[must_use]
    pub fn with_signature_templates(
        mut self,
        content: Option<String>,
        header: Option<String>,
    ) -> Self {
        self.signature_content_template = content;
        self.signature_header_template = header;
        self
    }

    /// Sets the signature encoding.
    #[must_use]
    pub const fn with_signature_encoding(mut self, encoding: SignatureEncoding) -> Self {
        self.signature_encoding = encoding;
        self
    }

    /// Sets the HMAC algorithm.
    #[must_use]
    pub const fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }
}
