//! Provider metadata: field schemas, display strings, instructions and the
//! compiled validation schema for each destination type.
//!
//! This module provides:
//! - The loader ([`MetadataLoader`]) merging bundled defaults with an
//!   optional override directory
//! - The descriptor types ([`ProviderMetadata`], [`FieldSchema`])
//! - The bundled provider list ([`PROVIDER_TYPES`])

mod embedded;
mod error;
mod loader;
mod types;

#[cfg(test)]
mod loader_tests;

pub use embedded::PROVIDER_TYPES;
pub use error::MetadataError;
pub use loader::MetadataLoader;
pub use types::{FieldSchema, ProviderMetadata};
