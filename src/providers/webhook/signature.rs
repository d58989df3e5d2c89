//! Multi-secret HMAC signing with rotation.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, TimeDelta, Utc};
use handlebars::Handlebars;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::provider::template_registry;
use crate::time::{Clock, SystemClock};

/// Default signing-string template.
pub const DEFAULT_CONTENT_TEMPLATE: &str = "{{timestamp}}.{{body}}";

/// Default signature header template.
pub const DEFAULT_HEADER_TEMPLATE: &str = "t={{timestamp}},v0={{join signatures \",\"}}";

const CONTENT: &str = "content";
const HEADER: &str = "header";

/// Non-latest secrets without `invalid_at` sign for this long after creation.
const ROLLING_WINDOW_HOURS: i64 = 24;

/// One signing secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSecret {
    /// Secret key material.
    pub key: String,
    /// When the secret was created.
    pub created_at: DateTime<Utc>,
    /// When the secret stops signing, if set explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_at: Option<DateTime<Utc>>,
}

impl WebhookSecret {
    /// Creates a secret without an explicit invalidation time.
    #[must_use]
    pub fn new(key: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            created_at,
            invalid_at: None,
        }
    }

    /// Sets the invalidation time.
    #[must_use]
    pub const fn with_invalid_at(mut self, invalid_at: DateTime<Utc>) -> Self {
        self.invalid_at = Some(invalid_at);
        self
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSecret")
            .field("key", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("invalid_at", &self.invalid_at)
            .finish()
    }
}

/// Unrecognized signing option.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Not one of `hmac-sha256`, `hmac-sha1`, `hmac-md5`.
    #[error("Unknown signature algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Not one of `hex`, `base64`.
    #[error("Unknown signature encoding: {0}")]
    UnknownEncoding(String),
}

/// HMAC hash function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// HMAC-SHA256.
    #[default]
    HmacSha256,
    /// HMAC-SHA1.
    HmacSha1,
    /// HMAC-MD5.
    HmacMd5,
}

impl SignatureAlgorithm {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha1 => "hmac-sha1",
            Self::HmacMd5 => "hmac-md5",
        }
    }

    /// Computes the raw MAC of `content` under `key`.
    ///
    /// Returns `None` only if the MAC cannot be keyed, which HMAC never refuses.
    #[must_use]
    pub fn sign(self, key: &[u8], content: &[u8]) -> Option<Vec<u8>> {
        match self {
            Self::HmacSha256 => mac::<Hmac<sha2::Sha256>>(key, content),
            Self::HmacSha1 => mac::<Hmac<sha1::Sha1>>(key, content),
            Self::HmacMd5 => mac::<Hmac<md5::Md5>>(key, content),
        }
    }
}

fn mac<M: Mac + hmac::digest::KeyInit>(key: &[u8], content: &[u8]) -> Option<Vec<u8>> {
    let mut mac = <M as hmac::digest::KeyInit>::new_from_slice(key).ok()?;
    mac.update(content);
    Some(mac.finalize().into_bytes().to_vec())
}

impl FromStr for SignatureAlgorithm {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha1" => Ok(Self::HmacSha1),
            "hmac-md5" => Ok(Self::HmacMd5),
            _ => Err(SignatureError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte-to-text encoding for signatures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureEncoding {
    /// Lowercase hexadecimal.
    #[default]
    Hex,
    /// Standard base64 with padding.
    Base64,
}

impl SignatureEncoding {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Base64 => "base64",
        }
    }

    /// Encodes raw MAC bytes.
    #[must_use]
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Hex => hex::encode(bytes),
            Self::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

impl FromStr for SignatureEncoding {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(Self::Hex),
            "base64" => Ok(Self::Base64),
            _ => Err(SignatureError::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for SignatureEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What gets signed for one request.
#[derive(Debug, Clone, Copy)]
pub struct SignaturePayload<'a> {
    /// Event identifier.
    pub event_id: &'a str,
    /// Event topic.
    pub topic: &'a str,
    /// Request timestamp.
    pub timestamp: DateTime<Utc>,
    /// Serialized request body.
    pub body: &'a str,
}

#[derive(Serialize)]
struct ContentContext<'a> {
    event_id: &'a str,
    topic: &'a str,
    timestamp: i64,
    body: &'a str,
}

#[derive(Serialize)]
struct HeaderContext<'a> {
    event_id: &'a str,
    topic: &'a str,
    timestamp: i64,
    signatures: &'a [String],
}

/// Signs request content with every currently valid secret.
///
/// # Rotation
///
/// Secrets are ordered newest first. The newest signs unless its explicit
/// `invalid_at` has passed. Every other secret signs until its `invalid_at`,
/// or for 24 hours after `created_at` when it has none.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use dest_registry::providers::webhook::{SignatureManager, SignaturePayload, WebhookSecret};
///
/// let manager = SignatureManager::new(vec![WebhookSecret::new("s3cr3t", Utc::now())]);
/// let payload = SignaturePayload {
///     event_id: "evt_1",
///     topic: "user.created",
///     timestamp: Utc::now(),
///     body: r#"{"id":1}"#,
/// };
///
/// let header = manager.generate_signature_header(&payload).unwrap();
/// assert!(header.starts_with("t="));
/// ```
#[derive(Debug, Clone)]
pub struct SignatureManager {
    secrets: Vec<WebhookSecret>,
    algorithm: SignatureAlgorithm,
    encoding: SignatureEncoding,
    templates: Arc<Handlebars<'static>>,
    clock: Arc<dyn Clock>,
}

impl SignatureManager {
    /// Creates a manager with HMAC-SHA256, hex encoding and the default templates.
    #[must_use]
    pub fn new(mut secrets: Vec<WebhookSecret>) -> Self {
        secrets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self {
            secrets,
            algorithm: SignatureAlgorithm::default(),
            encoding: SignatureEncoding::default(),
            templates: Arc::new(compile_templates(None, None)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the HMAC algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the signature encoding.
    #[must_use]
    pub const fn with_encoding(mut self, encoding: SignatureEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Sets the content and header templates.
    ///
    /// `None`, empty or unparsable templates fall back to the defaults.
    #[must_use]
    pub fn with_templates(mut self, content: Option<&str>, header: Option<&str>) -> Self {
        self.templates = Arc::new(compile_templates(content, header));
        self
    }

    /// Sets the clock used to judge secret validity.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the secrets, newest first.
    #[must_use]
    pub fn secrets(&self) -> &[WebhookSecret] {
        &self.secrets
    }

    /// Renders the signing string.
    ///
    /// Falls back to `<unix seconds>.<body>` if the template fails to render.
    #[must_use]
    pub fn format_content(&self, payload: &SignaturePayload<'_>) -> String {
        let context = ContentContext {
            event_id: payload.event_id,
            topic: payload.topic,
            timestamp: payload.timestamp.timestamp(),
            body: payload.body,
        };
        self.templates.render(CONTENT, &context).unwrap_or_else(|e| {
            tracing::warn!("Signature content template failed, using default: {e}");
            format!("{}.{}", context.timestamp, context.body)
        })
    }

    /// Signs the payload with every valid secret, newest first.
    ///
    /// Returns an empty list when no secret is valid.
    #[must_use]
    pub fn generate_signatures(&self, payload: &SignaturePayload<'_>) -> Vec<String> {
        let Some((latest, rest)) = self.secrets.split_first() else {
            return Vec::new();
        };

        let now = self.clock.now();
        let content = self.format_content(payload);
        let window = TimeDelta::hours(ROLLING_WINDOW_HOURS);

        let latest_valid = latest.invalid_at.is_none_or(|at| now < at);
        let others = rest.iter().filter(|secret| match secret.invalid_at {
            Some(at) => now <= at,
            None => now - secret.created_at < window,
        });

        latest_valid
            .then_some(latest)
            .into_iter()
            .chain(others)
            .filter_map(|secret| self.sign(&secret.key, &content))
            .collect()
    }

    /// Builds the signature header value.
    ///
    /// Returns `None` when no secret produced a signature.
    #[must_use]
    pub fn generate_signature_header(&self, payload: &SignaturePayload<'_>) -> Option<String> {
        let signatures = self.generate_signatures(payload);
        if signatures.is_empty() {
            return None;
        }

        let context = HeaderContext {
            event_id: payload.event_id,
            topic: payload.topic,
            timestamp: payload.timestamp.timestamp(),
            signatures: &signatures,
        };
        let header = self.templates.render(HEADER, &context).unwrap_or_else(|e| {
            tracing::warn!("Signature header template failed, using default: {e}");
            format!("t={},v0={}", context.timestamp, signatures.join(","))
        });
        Some(header)
    }

    /// Checks `signature` against the payload signed with `key`.
    ///
    /// The comparison runs in constant time.
    #[must_use]
    pub fn verify_signature(&self, signature: &str, key: &str, payload: &SignaturePayload<'_>) -> bool {
        let content = self.format_content(payload);
        self.sign(key, &content)
            .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(signature.as_bytes())))
    }

    fn sign(&self, key: &str, content: &str) -> Option<String> {
        self.algorithm
            .sign(key.as_bytes(), content.as_bytes())
            .map(|raw| self.encoding.encode(&raw))
    }
}

fn compile_templates(content: Option<&str>, header: Option<&str>) -> Handlebars<'static> {
    let mut registry = template_registry();
    register_or_default(&mut registry, CONTENT, content, DEFAULT_CONTENT_TEMPLATE);
    register_or_default(&mut registry, HEADER, header, DEFAULT_HEADER_TEMPLATE);
    registry
}

fn register_or_default(
    registry: &mut Handlebars<'static>,
    name: &str,
    template: Option<&str>,
    default: &str,
) {
    if let Some(template) = template.filter(|t| !t.is_empty()) {
        match registry.register_template_string(name, template) {
            Ok(()) => return,
            Err(e) => tracing::warn!("Invalid signature {name} template, using default: {e}"),
        }
    }
    // The defaults are known to parse.
    let _ = registry.register_template_string(name, default);
}
