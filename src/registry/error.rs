//! Error types for registry operations.

use thiserror::Error;

use crate::error::{PublishError, ValidationError};
use crate::metadata::MetadataError;
use crate::provider::ProviderError;

/// Error type for [`super::Registry`] and [`super::RegistryBuilder`].
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A provider for this type is already registered.
    #[error("Provider already registered for destination type: {0}")]
    Duplicate(String),

    /// No provider serves this destination type.
    #[error("No provider registered for destination type: {0}")]
    UnknownType(String),

    /// A provider's metadata could not be loaded.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The destination failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The provider refused to build a publisher.
    #[error("Failed to create publisher for destination {destination_id}: {source}")]
    CreatePublisher {
        /// Destination the publisher was for.
        destination_id: String,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },

    /// A publish failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl RegistryError {
    /// Returns the validation details, if this is a validation failure.
    #[must_use]
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            Self::CreatePublisher {
                source: ProviderError::Validation(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}
