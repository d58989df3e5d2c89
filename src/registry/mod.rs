//! Maps destination types to providers and caches publishers.
//!
//! This module provides:
//! - [`RegistryBuilder`]: explicit registration at startup
//! - [`Registry`]: read-only provider lookup plus a publisher cache keyed by
//!   destination id and configuration fingerprint
//! - [`DestinationDisplay`]: an obfuscated destination with its target

mod error;


use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::task::JoinSet;

use crate::context::CallContext;
use crate::error::PublishError;
use crate::metadata::{MetadataLoader, ProviderMetadata};
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::provider::{PreprocessOptions, Provider, Publisher};

pub use error::RegistryError;

/// Collects providers before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    loader: MetadataLoader,
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("loader", &self.loader)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RegistryBuilder {
    /// Creates an empty builder that keeps `loader` for later lookups.
    #[must_use]
    pub fn new(loader: MetadataLoader) -> Self {
        Self {
            loader,
            providers: BTreeMap::new(),
        }
    }

    /// Returns the metadata loader providers should be built with.
    #[must_use]
    pub const fn loader(&self) -> &MetadataLoader {
        &self.loader
    }

    /// Registers a provider under its metadata type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the type is already taken.
    pub fn register<P: Provider + 'static>(
        &mut self,
        provider: P,
    ) -> Result<&mut Self, RegistryError> {
        self.register_shared(Arc::new(provider))
    }

    /// Registers an already shared provider.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the type is already taken.
    pub fn register_shared(
        &mut self,
        provider: Arc<dyn Provider>,
    ) -> Result<&mut Self, RegistryError> {
        let provider_type = provider.provider_type().to_string();
        if self.providers.contains_key(&provider_type) {
            return Err(RegistryError::Duplicate(provider_type));
        }
        tracing::info!(provider_type = %provider_type, "Registered provider");
        self.providers.insert(provider_type, provider);
        Ok(self)
    }

    /// Freezes the provider map.
    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            loader: self.loader,
            providers: self.providers,
            publishers: RwLock::new(HashMap::new()),
        }
    }
}

/// A destination prepared for display: credentials masked, target derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationDisplay {
    /// The obfuscated destination.
    #[serde(flatten)]
    pub destination: Destination,
    /// Where it delivers.
    #[serde(flatten)]
    pub target: DestinationTarget,
}

struct CachedPublisher {
    fingerprint: String,
    publisher: Arc<dyn Publisher>,
}

/// Fingerprints everything a publisher is built from.
///
/// Entries are length-prefixed so distinct maps never collide by
/// concatenation.
#[must_use]
pub fn publisher_fingerprint(destination: &Destination) -> String {
    let mut hasher = Sha256::new();
    let mut feed = |part: &str| {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    };
    feed(&destination.destination_type);
    let sections = [
        ("config", &destination.config),
        ("credentials", &destination.credentials),
    ];
    for (section, map) in sections {
        feed(section);
        for (key, value) in map {
            feed(key);
            feed(value);
        }
    }
    hex::encode(&hasher.finalize()[..8])
}

/// Provider lookup and publisher cache.
///
/// The provider map is immutable after [`RegistryBuilder::build`]. Publishers
/// are created on first use, shared behind `Arc`, and replaced (the old one
/// closed in the background) when a destination's configuration changes.
pub struct Registry {
    loader: MetadataLoader,
    providers: BTreeMap<String, Arc<dyn Provider>>,
    publishers: RwLock<HashMap<String, CachedPublisher>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("loader", &self.loader)
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Starts a builder.
    #[must_use]
    pub fn builder(loader: MetadataLoader) -> RegistryBuilder {
        RegistryBuilder::new(loader)
    }

    /// Returns the metadata loader.
    #[must_use]
    pub const fn metadata_loader(&self) -> &MetadataLoader {
        &self.loader
    }

    /// Returns the provider for `provider_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] if none is registered.
    pub fn provider(&self, provider_type: &str) -> Result<&Arc<dyn Provider>, RegistryError> {
        self.providers
            .get(provider_type)
            .ok_or_else(|| RegistryError::UnknownType(provider_type.to_string()))
    }

    /// Returns the registered type keys in order.
    pub fn provider_types(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Validates `destination` with its provider.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] or [`RegistryError::Validation`].
    pub fn validate_destination(&self, destination: &Destination) -> Result<(), RegistryError> {
        self.provider(&destination.destination_type)?
            .validate(destination)
            .map_err(RegistryError::from)
    }

    /// Runs the provider's preprocessing on a destination about to be saved.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] or [`RegistryError::Validation`].
    pub async fn preprocess_destination(
        &self,
        ctx: &CallContext,
        destination: &mut Destination,
        original: Option<&Destination>,
        opts: &PreprocessOptions,
    ) -> Result<(), RegistryError> {
        let provider = self.provider(&destination.destination_type)?;
        provider
            .preprocess(ctx, destination, original, opts)
            .await
            .map_err(RegistryError::from)
    }

    /// Masks credentials and derives the display target.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] if no provider serves the type.
    pub fn display_destination(
        &self,
        destination: &Destination,
    ) -> Result<DestinationDisplay, RegistryError> {
        let provider = self.provider(&destination.destination_type)?;
        Ok(DestinationDisplay {
            destination: provider.obfuscate_destination(destination),
            target: provider.compute_target(destination),
        })
    }

    /// Returns a cached publisher for `destination`, creating it if needed.
    ///
    /// A cached publisher built from a different configuration is replaced
    /// and closed in the background.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] or
    /// [`RegistryError::CreatePublisher`].
    pub async fn resolve_publisher(
        &self,
        destination: &Destination,
    ) -> Result<Arc<dyn Publisher>, RegistryError> {
        let fingerprint = publisher_fingerprint(destination);

        if let Some(cached) = self.publishers.read().await.get(&destination.id) {
            if cached.fingerprint == fingerprint {
                return Ok(Arc::clone(&cached.publisher));
            }
        }

        let mut publishers = self.publishers.write().await;
        if let Some(cached) = publishers.get(&destination.id) {
            if cached.fingerprint == fingerprint {
                return Ok(Arc::clone(&cached.publisher));
            }
        }

        let provider = self.provider(&destination.destination_type)?;
        let publisher: Arc<dyn Publisher> = provider
            .create_publisher(destination)
            .map_err(|source| RegistryError::CreatePublisher {
                destination_id: destination.id.clone(),
                source,
            })?
            .into();

        let replaced = publishers.insert(
            destination.id.clone(),
            CachedPublisher {
                fingerprint,
                publisher: Arc::clone(&publisher),
            },
        );
        drop(publishers);

        if let Some(stale) = replaced {
            tracing::info!(
                destination_id = %destination.id,
                "Destination changed, replacing publisher"
            );
            close_in_background(destination.id.clone(), stale.publisher);
        }
        Ok(publisher)
    }

    /// Publishes `event` through the cached publisher for `destination`.
    ///
    /// # Errors
    ///
    /// Returns the publisher's [`PublishError`]. Failures to resolve a
    /// publisher are wrapped as [`PublishError::Unexpected`].
    pub async fn publish_event(
        &self,
        ctx: &CallContext,
        destination: &Destination,
        event: &Event,
    ) -> Result<Delivery, PublishError> {
        let publisher = self
            .resolve_publisher(destination)
            .await
            .map_err(PublishError::unexpected)?;
        publisher.publish(ctx, event).await
    }

    /// Returns the metadata for `provider_type`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] if none is registered.
    pub fn retrieve_provider_metadata(
        &self,
        provider_type: &str,
    ) -> Result<&ProviderMetadata, RegistryError> {
        self.provider(provider_type).map(|p| p.metadata())
    }

    /// Returns the metadata of every registered provider, ordered by type.
    #[must_use]
    pub fn list_provider_metadata(&self) -> Vec<&ProviderMetadata> {
        self.providers.values().map(|p| p.metadata()).collect()
    }

    /// Drops and closes the cached publisher for `destination_id`.
    ///
    /// Returns false if none was cached.
    pub async fn remove_publisher(&self, destination_id: &str) -> bool {
        let removed = self.publishers.write().await.remove(destination_id);
        match removed {
            Some(cached) => {
                close_logged(destination_id, cached.publisher.as_ref()).await;
                true
            }
            None => false,
        }
    }

    /// Closes every cached publisher, waiting for in-flight publishes.
    ///
    /// Returns the number of publishers closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<_> = self.publishers.write().await.drain().collect();
        let count = drained.len();

        let mut closing = JoinSet::new();
        for (destination_id, cached) in drained {
            closing.spawn(async move {
                close_logged(&destination_id, cached.publisher.as_ref()).await;
            });
        }
        while let Some(joined) = closing.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Publisher close task failed: {e}");
            }
        }

        tracing::info!(count, "Closed all publishers");
        count
    }
}

async fn close_logged(destination_id: &str, publisher: &dyn Publisher) {
    if let Err(e) = publisher.close().await {
        tracing::warn!(destination_id = %destination_id, "Failed to close publisher: {e}");
    }
}

fn close_in_background(destination_id: String, publisher: Arc<dyn Publisher>) {
    tokio::spawn(async move {
        close_logged(&destination_id, publisher.as_ref()).await;
    });
}
