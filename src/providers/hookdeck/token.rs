//! Relay source tokens.

use std::fmt;

use base64::Engine as _;
use thiserror::Error;

/// Why a token could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The token is not standard base64.
    #[error("invalid token: not base64 encoded")]
    NotBase64,

    /// The decoded token is not `id:key`.
    #[error("invalid token format: expected 'id:random_string'")]
    Format,
}

/// A decoded relay source token.
///
/// The signing key is the full, still-encoded token string.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceToken {
    id: String,
    signing_key: String,
}

impl SourceToken {
    /// Decodes a base64 `id:key` token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if the token is not base64 or not `id:key`.
    pub fn parse(token: &str) -> Result<Self, TokenError> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(token)
            .map_err(|_| TokenError::NotBase64)?;
        let decoded = String::from_utf8(decoded).map_err(|_| TokenError::Format)?;

        match decoded.split_once(':') {
            Some((id, _)) if !id.is_empty() => Ok(Self {
                id: id.to_string(),
                signing_key: token.to_string(),
            }),
            _ => Err(TokenError::Format),
        }
    }

    /// Returns the source id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the key used to sign payloads and authenticate verification.
    #[must_use]
    pub fn signing_key(&self) -> &str {
        &self.signing_key
    }
}

impl fmt::Debug for SourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceToken")
            .field("id", &self.id)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}
