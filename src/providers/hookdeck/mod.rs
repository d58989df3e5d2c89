//! Delivery through a relay source authenticated by a source token.
//!
//! This module provides:
//! - [`HookdeckProvider`]: token validation, verification on save, display
//! - [`HookdeckPublisher`]: signed `POST` of the event data to the relay
//! - [`SourceToken`]: the decoded `id:key` token

mod token;


use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use http::{HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::json;

use crate::context::CallContext;
use crate::error::{PublishAttemptError, PublishError, ValidationError, tag};
use crate::metadata::{MetadataError, MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::provider::{
    BaseProvider, PreprocessOptions, Provider, ProviderError, PublishLifecycle, Publisher,
    make_metadata,
};
use crate::providers::attempt;
use crate::providers::webhook::SignatureAlgorithm;
use crate::time::{Clock, SystemClock};
use crate::transport::{HttpClient, HttpRequest};

pub use token::{SourceToken, TokenError};

/// Destination type key.
pub const PROVIDER_TYPE: &str = "hookdeck";

const TOKEN_FIELD: &str = "credentials.token";
const METADATA_HEADER_PREFIX: &str = "x-outpost-";
const SIGNATURE_HEADER: &str = "x-hookdeck-signature";
const SOURCE_TOKEN_HEADER: &str = "x-hookdeck-source-token";

/// Base URLs of the relay service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpoints {
    /// API base used for token verification.
    pub api_base: String,
    /// Ingestion base; events go to `<events_base>/<source id>`.
    pub events_base: String,
    /// Dashboard base used for display links.
    pub dashboard_base: String,
}

impl Default for RelayEndpoints {
    fn default() -> Self {
        Self {
            api_base: "https://api.hookdeck.com/2025-01-01".to_string(),
            events_base: "https://hkdk.events".to_string(),
            dashboard_base: "https://dashboard.hookdeck.com".to_string(),
        }
    }
}

impl RelayEndpoints {
    fn verify_url(&self, token: &SourceToken) -> Option<url::Url> {
        let raw = format!(
            "{}/sources/{}/managed/verify",
            self.api_base.trim_end_matches('/'),
            token.id()
        );
        url::Url::parse(&raw).ok()
    }

    fn events_url(&self, token: &SourceToken) -> Option<url::Url> {
        let raw = format!("{}/{}", self.events_base.trim_end_matches('/'), token.id());
        url::Url::parse(&raw).ok()
    }

    fn source_link(&self, source_id: &str) -> String {
        format!(
            "{}/sources/{source_id}",
            self.dashboard_base.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct SourceResponse {
    name: String,
}

/// Provider for the relay destination.
#[derive(Debug)]
pub struct HookdeckProvider<H> {
    base: BaseProvider,
    client: H,
    endpoints: RelayEndpoints,
    clock: Arc<dyn Clock>,
}

impl<H> HookdeckProvider<H> {
    /// Loads the relay metadata and binds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError`] if the descriptor cannot be loaded.
    pub fn new(loader: &MetadataLoader, client: H) -> Result<Self, MetadataError> {
        Ok(Self {
            base: BaseProvider::new(loader, PROVIDER_TYPE)?,
            client,
            endpoints: RelayEndpoints::default(),
            clock: Arc::new(SystemClock),
        })
    }

    /// Overrides the relay base URLs.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: RelayEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Sets the clock used for the metadata timestamp.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn resolve(&self, destination: &Destination) -> Result<Option<SourceToken>, ValidationError> {
        self.base.validate(destination)?;
        destination
            .credential_value("token")
            .map(|raw| {
                SourceToken::parse(raw)
                    .map_err(|_| ValidationError::single(TOKEN_FIELD, "invalid_token_format"))
            })
            .transpose()
    }
}

impl<H: HttpClient> HookdeckProvider<H> {
    async fn verify(&self, ctx: &CallContext, token: &SourceToken) -> Option<SourceResponse> {
        let url = self.endpoints.verify_url(token)?;
        let value = HeaderValue::from_str(token.signing_key()).ok()?;
        let request =
            HttpRequest::get(url).with_header(HeaderName::from_static(SOURCE_TOKEN_HEADER), value);

        match ctx.run(self.client.request(request)).await {
            Ok(Ok(response)) if response.status == http::StatusCode::OK => {
                serde_json::from_slice(&response.body).ok()
            }
            Ok(Ok(response)) => {
                tracing::warn!(
                    source_id = token.id(),
                    status = response.status.as_u16(),
                    "Source token verification rejected"
                );
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(source_id = token.id(), "Source token verification failed: {e}");
                None
            }
            Err(e) => {
                tracing::warn!(source_id = token.id(), "Source token verification failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl<H> Provider for HookdeckProvider<H>
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
        let token = self
            .resolve(destination)?
            .ok_or_else(|| ValidationError::single(TOKEN_FIELD, "required"))?;
        let url = self
            .endpoints
            .events_url(&token)
            .ok_or_else(|| ValidationError::single(TOKEN_FIELD, "invalid_token_format"))?;

        tracing::info!(
            destination_id = %destination.id,
            source_id = token.id(),
            "Created relay publisher"
        );
        Ok(Box::new(HookdeckPublisher {
            client: self.client.clone(),
            token,
            url,
            clock: Arc::clone(&self.clock),
            lifecycle: PublishLifecycle::new(),
        }))
    }

    fn compute_target(&self, destination: &Destination) -> DestinationTarget {
        if let (Some(name), Some(id)) = (
            destination.config_value("source_name"),
            destination.config_value("source_id"),
        ) {
            return DestinationTarget::new(name).with_url(self.endpoints.source_link(id));
        }

        let Some(raw) = destination.credential_value("token") else {
            return DestinationTarget::new("Hookdeck (no token)");
        };
        match SourceToken::parse(raw) {
            Ok(token) => DestinationTarget::new(format!("Hookdeck source ID: {}", token.id()))
                .with_url(self.endpoints.source_link(token.id())),
            Err(_) => DestinationTarget::new("Hookdeck (invalid token)"),
        }
    }

    async fn preprocess(
        &self,
        ctx: &CallContext,
        destination: &mut Destination,
        original: Option<&Destination>,
        _opts: &PreprocessOptions,
    ) -> Result<(), ValidationError> {
        let Some(raw) = destination.credential_value("token") else {
            return Err(ValidationError::single(TOKEN_FIELD, "token_required"));
        };
        let token = SourceToken::parse(raw)
            .map_err(|_| ValidationError::single(TOKEN_FIELD, "invalid_token_format"))?;

        let unchanged = original.is_some_and(|o| o.credential_value("token") == Some(raw));
        if unchanged {
            return Ok(());
        }

        let source = self
            .verify(ctx, &token)
            .await
            .ok_or_else(|| ValidationError::single(TOKEN_FIELD, "token_verification_failed"))?;

        destination
            .config
            .insert("source_name".to_string(), source.name);
        destination
            .config
            .insert("source_id".to_string(), token.id().to_string());
        tracing::debug!(source_id = token.id(), "Verified source token");
        Ok(())
    }

    fn obfuscate_destination(&self, destination: &Destination) -> Destination {
        self.base.obfuscate_destination(destination)
    }
}

/// Sends each event to the relay with an HMAC-SHA256 body signature.
#[derive(Debug)]
pub struct HookdeckPublisher<H> {
    client: H,
    token: SourceToken,
    url: url::Url,
    clock: Arc<dyn Clock>,
    lifecycle: PublishLifecycle,
}

impl<H> HookdeckPublisher<H> {
    /// Builds the relay request for `event`.
    ///
    /// # Errors
    ///
    /// Returns a `format_failed` [`PublishAttemptError`] if the data cannot
    /// be serialized or signed.
    pub fn format(&self, event: &Event) -> Result<HttpRequest, PublishAttemptError> {
        let format_error = || PublishAttemptError::new(PROVIDER_TYPE, tag::FORMAT);

        let body = serde_json::to_vec(&event.data).map_err(|e| format_error().with_source(e))?;
        let mac = SignatureAlgorithm::HmacSha256
            .sign(self.token.signing_key().as_bytes(), &body)
            .ok_or_else(format_error)?;
        let signature = format!(
            "v0={}",
            base64::engine::general_purpose::STANDARD.encode(mac)
        );

        let mut request = HttpRequest::post(self.url.clone()).with_json_body(body);
        if let Ok(value) = HeaderValue::from_str(&signature) {
            request
                .headers
                .insert(HeaderName::from_static(SIGNATURE_HEADER), value);
        }

        for (key, value) in make_metadata(event, self.clock.now()) {
            let name = format!("{METADATA_HEADER_PREFIX}{}", key.to_lowercase());
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    request.headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping header that is not valid HTTP"),
            }
        }
        Ok(request)
    }
}

#[async_trait]
impl<H> Publisher for HookdeckPublisher<H>
where
    H: HttpClient + std::fmt::Debug + 'static,
{
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError> {
        let _guard = self.lifecycle.start_publish()?;

        let request = self.format(event)?;
        tracing::debug!(event_id = %event.id, source_id = self.token.id(), "Sending to relay");

        let delivery = attempt::send_http(PROVIDER_TYPE, ctx, &self.client, request)
            .await
            .map_err(|e| {
                let data = json!({ "source_id": self.token.id(), "error": e.data.clone() });
                e.with_data(data)
            })?;
        Ok(delivery)
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.lifecycle.start_close().await;
        tracing::info!(source_id = self.token.id(), "Closed relay publisher");
        Ok(())
    }
}
