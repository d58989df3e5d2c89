//! Signed HTTP POST delivery.
//!
//! This module provides:
//! - [`WebhookProvider`]: validation, secret preprocessing and publisher creation
//! - [`WebhookPublisher`]: formats and sends one signed request per event
//! - [`SignatureManager`]: multi-secret HMAC signing with rotation

mod credentials;
mod options;
mod publisher;
mod signature;


use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::error::{ValidationError, ValidationErrorDetail};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Destination, DestinationTarget};
use crate::provider::{BaseProvider, PreprocessOptions, Provider, ProviderError, Publisher};
use crate::time::{Clock, SystemClock};
use crate::transport::HttpClient;

pub use credentials::{generate_secret, key};
pub use options::{DEFAULT_HEADER_PREFIX, WebhookOptions};
pub use publisher::WebhookPublisher;
pub use signature::{
    DEFAULT_CONTENT_TEMPLATE, DEFAULT_HEADER_TEMPLATE, SignatureAlgorithm, SignatureEncoding,
    SignatureError, SignatureManager, SignaturePayload, WebhookSecret,
};

/// Destination type key.
pub const PROVIDER_TYPE: &str = "webhook";

/// Provider for signed HTTP webhooks.
///
/// # Type Parameters
///
/// - `H`: The HTTP client shared by every publisher it creates
///
/// # Example
///
/// ```
/// use dest_registry::metadata::MetadataLoader;
/// use dest_registry::models::Destination;
/// use dest_registry::provider::Provider;
/// use dest_registry::providers::webhook::{WebhookOptions, WebhookProvider};
/// use dest_registry::transport::ReqwestClient;
///
/// let provider = WebhookProvider::new(
///     &MetadataLoader::new(),
///     ReqwestClient::new(),
///     WebhookOptions::default(),
/// )
/// .unwrap();
///
/// let destination = Destination::new("des_1", "webhook")
///     .with_config("url", "https://example.com/hook");
/// assert!(provider.validate(&destination).is_ok());
/// ```
#[derive(Debug)]
pub struct WebhookProvider<H> {
    base: BaseProvider,
    client: H,
    options: WebhookOptions,
    clock: Arc<dyn Clock>,
}

impl<H> WebhookProvider<H> {
    /// Loads the webhook metadata and binds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the webhook descriptor cannot be loaded.
    pub fn new(
        loader: &MetadataLoader,
        client: H,
        options: WebhookOptions,
    ) -> Result<Self, MetadataError> {
        Ok(Self {
            base: BaseProvider::new(loader, PROVIDER_TYPE)?,
            client,
            options,
            clock: Arc::new(SystemClock),
        })
    }

    /// Sets the clock used for timestamps, secret validity and rotation.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the provider-wide options.
    #[must_use]
    pub const fn options(&self) -> &WebhookOptions {
        &self.options
    }

    fn check_url(destination: &Destination) -> Option<ValidationErrorDetail> {
        let raw = destination.config_value("url")?;
        match url::Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => None,
            _ => Some(ValidationErrorDetail::new("config.url", "format")),
        }
    }

    /// Schema validation, then URL and credential checks.
    fn resolve(&self, destination: &Destination) -> Result<Vec<WebhookSecret>, ValidationError> {
        self.base.validate(destination)?;

        let mut details: Vec<_> = Self::check_url(destination).into_iter().collect();
        let secrets = match credentials::resolve_secrets(destination, self.clock.now()) {
            Ok(secrets) => secrets,
            Err(e) => {
                details.extend(e.errors);
                Vec::new()
            }
        };
        ValidationError::check(details)?;
        Ok(secrets)
    }
}

#[async_trait]
impl<H> Provider for WebhookProvider<H>
where
    H: HttpClient + Clone + std::fmt::Debug + 'static,
{
    fn metadata(&self) -> &ProviderMetadata {
        self.base.metadata()
    }

    fn validate(&self, destination: &Destination) -> Result<(), ValidationError> {
        self.resolve(destination).map(|_| ())
    }

    fn create_publisher(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn Publisher>, ProviderError> {
        let secrets = self.resolve(destination)?;
        let url = destination
            .config_value("url")
            .and_then(|raw| url::Url::parse(raw).ok())
            .ok_or_else(|| ValidationError::single("config.url", "format"))?;

        let signer = SignatureManager::new(secrets)
            .with_algorithm(self.options.signature_algorithm)
            .with_encoding(self.options.signature_encoding)
            .with_templates(
                self.options.signature_content_template.as_deref(),
                self.options.signature_header_template.as_deref(),
            )
            .with_clock(Arc::clone(&self.clock));

        tracing::info!(destination_id = %destination.id, "Created webhook publisher");
        Ok(Box::new(WebhookPublisher::new(
            self.client.clone(),
            url,
            signer,
            self.options.clone(),
            Arc::clone(&self.clock),
        )))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        let url = destination.config_value("url").unwrap_or_default();
        DestinationTarget::new(url)
    }

    async fn preprocess(
        &self,
        _ctx: &CallContext,
        destination: &mut Destination,
        original: Option<&Destination>,
        opts: &PreprocessOptions,
    ) -> Result<(), ValidationError> {
        let prepared =
            credentials::prepare_credentials(destination, original, opts.role, self.clock.now())?;

        let mut candidate = destination.clone();
        candidate.credentials = prepared;
        self.resolve(&candidate)?;

        destination.credentials = candidate.credentials;
        tracing::debug!(destination_id = %destination.id, "Prepared webhook credentials");
        Ok(())
    }

    fn obfuscate_destination(&self, destination: &Destination) -> Destination {
        self.base.obfuscate_destination(destination)
    }
}
