//! Secret resolution, generation and rotation for webhook destinations.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rand::RngCore;

use super::signature::WebhookSecret;
use crate::error::{ValidationError, ValidationErrorDetail};
use crate::models::{Destination, StringMap};
use crate::provider::Role;

/// Credential keys.
pub mod key {
    /// Current signing secret.
    pub const SECRET: &str = "secret";
    /// Secret being rotated out.
    pub const PREVIOUS_SECRET: &str = "previous_secret";
    /// RFC 3339 time after which the previous secret stops signing.
    pub const PREVIOUS_SECRET_INVALID_AT: &str = "previous_secret_invalid_at";
    /// JSON list of secrets, used instead of the three keys above.
    pub const SECRETS: &str = "secrets";
    /// Truthy value requests a rotation during preprocessing.
    pub const ROTATE_SECRET: &str = "rotate_secret";
}

const SECRET_BYTES: usize = 32;
const DEFAULT_INVALIDATION_HOURS: i64 = 24;

/// The previous secret is treated as created this long before the current one.
const PREVIOUS_SECRET_AGE_HOURS: i64 = 1;

fn field(name: &str) -> String {
    format!("credentials.{name}")
}

/// Resolves the signing secrets of a destination.
///
/// A `secrets` JSON list takes precedence. Otherwise `secret` is created
/// "now" and `previous_secret` one hour earlier, invalid at
/// `previous_secret_invalid_at`.
pub fn resolve_secrets(
    destination: &Destination,
    now: DateTime<Utc>,
) -> Result<Vec<WebhookSecret>, ValidationError> {
    if let Some(list) = destination.credential_value(key::SECRETS) {
        return parse_secret_list(list);
    }

    let mut secrets = Vec::new();
    if let Some(secret) = destination.credential_value(key::SECRET) {
        secrets.push(WebhookSecret::new(secret, now));
    }

    let invalid_at = match destination.credential_value(key::PREVIOUS_SECRET_INVALID_AT) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|at| at.with_timezone(&Utc))
                .map_err(|_| {
                    ValidationError::single(field(key::PREVIOUS_SECRET_INVALID_AT), "pattern")
                })?,
        ),
        None => None,
    };

    if let Some(previous) = destination.credential_value(key::PREVIOUS_SECRET) {
        let Some(invalid_at) = invalid_at else {
            return Err(ValidationError::single(
                field(key::PREVIOUS_SECRET_INVALID_AT),
                "required",
            ));
        };
        secrets.push(
            WebhookSecret::new(previous, now - TimeDelta::hours(PREVIOUS_SECRET_AGE_HOURS))
                .with_invalid_at(invalid_at),
        );
    }

    Ok(secrets)
}

fn parse_secret_list(raw: &str) -> Result<Vec<WebhookSecret>, ValidationError> {
    let secrets: Vec<WebhookSecret> = serde_json::from_str(raw)
        .map_err(|_| ValidationError::single(field(key::SECRETS), "format"))?;
    if secrets.iter().any(|s| s.key.is_empty()) {
        return Err(ValidationError::single(field(key::SECRETS), "required"));
    }
    Ok(secrets)
}

/// Generates a 32-byte random secret, hex encoded.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0_u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Accepts `true`, `1`, `on`, `yes` in any case.
fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "on" | "yes"
    )
}

fn default_invalid_at(now: DateTime<Utc>) -> String {
    (now + TimeDelta::hours(DEFAULT_INVALIDATION_HOURS)).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Computes the credentials a destination is saved with.
///
/// Generates a secret when none is given, rotates on a truthy
/// `rotate_secret`, and defaults the previous secret's invalidation to 24
/// hours from `now`. A `secrets` list is kept verbatim and never rotated.
/// Tenants may not choose secrets.
pub fn prepare_credentials(
    new: &Destination,
    original: Option<&Destination>,
    role: Role,
    now: DateTime<Utc>,
) -> Result<StringMap, ValidationError> {
    let mut credentials = StringMap::new();

    if new.credential_value(key::ROTATE_SECRET).is_some_and(is_truthy) {
        let Some(original) = original else {
            return Err(ValidationError::single(field(key::ROTATE_SECRET), "invalid"));
        };
        if new.credential_value(key::SECRETS).is_some()
            || original.credential_value(key::SECRETS).is_some()
        {
            return Err(ValidationError::single(field(key::ROTATE_SECRET), "invalid"));
        }
        let Some(current) = original.credential_value(key::SECRET) else {
            return Err(ValidationError::single(field(key::SECRET), "required"));
        };

        credentials.insert(key::SECRET.to_string(), generate_secret());
        credentials.insert(key::PREVIOUS_SECRET.to_string(), current.to_string());
        credentials.insert(
            key::PREVIOUS_SECRET_INVALID_AT.to_string(),
            new.credential_value(key::PREVIOUS_SECRET_INVALID_AT)
                .map_or_else(|| default_invalid_at(now), ToString::to_string),
        );
        return Ok(credentials);
    }

    if role == Role::Tenant {
        check_tenant_unchanged(new, original)?;
    }

    if let Some(list) = new.credential_value(key::SECRETS) {
        parse_secret_list(list)?;
        credentials.insert(key::SECRETS.to_string(), list.to_string());
        return Ok(credentials);
    }

    let secret = new
        .credential_value(key::SECRET)
        .map_or_else(generate_secret, ToString::to_string);
    credentials.insert(key::SECRET.to_string(), secret);

    if let Some(previous) = new.credential_value(key::PREVIOUS_SECRET) {
        credentials.insert(key::PREVIOUS_SECRET.to_string(), previous.to_string());
        credentials.insert(
            key::PREVIOUS_SECRET_INVALID_AT.to_string(),
            new.credential_value(key::PREVIOUS_SECRET_INVALID_AT)
                .map_or_else(|| default_invalid_at(now), ToString::to_string),
        );
    }

    Ok(credentials)
}

/// Tenants may resubmit the stored secrets but never pick new ones.
fn check_tenant_unchanged(
    new: &Destination,
    original: Option<&Destination>,
) -> Result<(), ValidationError> {
    let mut details = Vec::new();
    for name in [key::SECRET, key::PREVIOUS_SECRET, key::SECRETS] {
        let Some(value) = new.credential_value(name) else {
            continue;
        };
        let stored = original.and_then(|o| o.credential_value(name));
        if stored != Some(value) {
            details.push(ValidationErrorDetail::new(field(name), "forbidden"));
        }
    }
    ValidationError::check(details)
}
