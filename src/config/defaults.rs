//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default HTTP client timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Default per-call publish deadline in seconds.
pub const PUBLISH_TIMEOUT_SECS: u64 = 30;

/// Default configuration file name written by `init`.
pub const CONFIG_FILE: &str = "dest-registry.toml";

/// Default `User-Agent` for outbound HTTP requests.
#[must_use]
pub fn user_agent() -> String {
    format!("dest-registry/{}", env!("CARGO_PKG_VERSION"))
}

/// Default HTTP client timeout as Duration.
#[must_use]
pub const fn http_timeout() -> Duration {
    Duration::from_secs(HTTP_TIMEOUT_SECS)
}

/// Default publish deadline as Duration.
#[must_use]
pub const fn publish_timeout() -> Duration {
    Duration::from_secs(PUBLISH_TIMEOUT_SECS)
}
