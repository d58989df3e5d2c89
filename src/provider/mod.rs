//! The provider/publisher contract and the behavior every provider shares.
//!
//! This module provides:
//! - The capability traits ([`Provider`], [`Publisher`])
//! - Schema validation and obfuscation ([`BaseProvider`], [`obfuscate_value`])
//! - The publish/close lifecycle ([`PublishLifecycle`], [`PublishGuard`])
//! - Wire formatting helpers ([`make_metadata`], [`KeyTemplate`])

mod base;
mod format;
mod lifecycle;

#[cfg(test)]
mod format_tests;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::CallContext;
use crate::error::{PublishError, ValidationError};
use crate::metadata::ProviderMetadata;
use crate::models::{Delivery, Destination, DestinationTarget, Event};
use crate::transport::TransportError;

pub use base::{BaseProvider, obfuscate_value};
pub use format::{KeyTemplate, make_metadata};
pub(crate) use format::template_registry;
pub use lifecycle::{PublishGuard, PublishLifecycle};

/// Who is saving a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Role {
    /// Platform operator; may set secrets explicitly.
    #[default]
    Admin,
    /// Tenant user; secrets are generated or rotated, never chosen.
    Tenant,
}

/// Options passed to [`Provider::preprocess`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessOptions {
    /// Who is saving the destination.
    pub role: Role,
}

impl PreprocessOptions {
    /// Options for the given role.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        Self { role }
    }
}

/// Error returned by [`Provider::create_publisher`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The destination does not resolve to a valid configuration.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The transport client could not be set up.
    #[error("Failed to set up transport: {0}")]
    Transport(#[from] TransportError),
}

/// The implementation bound to one destination type.
///
/// Providers compose a [`BaseProvider`] for schema validation and
/// obfuscation and hand out [`Publisher`]s that compose a
/// [`PublishLifecycle`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the descriptor loaded at construction.
    fn metadata(&self) -> &ProviderMetadata;

    /// Returns the type key this provider serves.
    fn provider_type(&self) -> &str {
        &self.metadata().provider_type
    }

    /// Validates a destination against the schema and protocol rules.
    ///
    /// # Errors
    ///
    /// Returns every collected [`ValidationError`] detail.
    fn validate(&self, destination: &Destination) -> Result<(), ValidationError>;

    /// Builds a publisher bound to the destination's resolved settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] if the destination does not
    /// validate, or [`ProviderError::Transport`] if an eager transport
    /// handle cannot be created.
    fn create_publisher(
        &self,
        destination: &Destination,
    ) -> Result<Box<dyn Publisher>, ProviderError>;

    /// Describes where the destination delivers. Pure and infallible.
    fn compute_target(&self, destination: &Destination) -> DestinationTarget;

    /// Enriches a destination before it is first saved or updated.
    ///
    /// The default does nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the destination cannot be accepted.
    async fn preprocess(
        &self,
        _ctx: &CallContext,
        _destination: &mut Destination,
        _original: Option<&Destination>,
        _opts: &PreprocessOptions,
    ) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Returns a copy with every sensitive value masked.
    fn obfuscate_destination(&self, destination: &Destination) -> Destination;
}

/// A per-destination sender owning its transport handle.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers one event.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Closed`] once closing has begun, or
    /// [`PublishError::Attempt`] when the attempt fails.
    async fn publish(&self, ctx: &CallContext, event: &Event) -> Result<Delivery, PublishError>;

    /// Stops admitting events, drains in-flight publishes and releases the transport.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the transport reports a close failure.
    async fn close(&self) -> Result<(), PublishError>;
}
