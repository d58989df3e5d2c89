//! Command execution.
//!
//! Builds the registry from validated config and runs one operator command
//! against it, returning the text to print.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use dest_registry::config::{Command, ValidatedConfig};
use dest_registry::context::CallContext;
use dest_registry::error::PublishError;
use dest_registry::models::{Destination, Event};
use dest_registry::providers::DefaultProviders;
use dest_registry::registry::{Registry, RegistryBuilder, RegistryError};
use dest_registry::transport::{HttpError, ReqwestClient};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for command execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] HttpError),

    /// Failed to read an input file.
    #[error("Failed to read '{}': {source}", path.display())]
    ReadInput {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// An input file is not valid JSON for its type.
    #[error("Failed to parse '{}': {source}", path.display())]
    ParseInput {
        /// Input path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The publish failed. Carries the delivery record, if one was produced.
    #[error("Publish failed: {error}")]
    Publish {
        /// Underlying publish error
        #[source]
        error: PublishError,
        /// Rendered delivery record
        delivery: Option<String>,
    },

    /// Output could not be rendered.
    #[error("Failed to render output: {0}")]
    Render(#[source] serde_json::Error),
}

/// Builds the registry with every HTTP-backed provider.
///
/// # Errors
///
/// Returns [`RunError::HttpClient`] if the client cannot be built, or
/// [`RunError::Registry`] if provider metadata fails to load.
pub fn build_registry(config: &ValidatedConfig) -> Result<Registry, RunError> {
    let http = ReqwestClient::with_settings(config.http.timeout, &config.http.user_agent)
        .map_err(RunError::HttpClient)?;

    let mut builder = RegistryBuilder::new(config.metadata_loader());
    DefaultProviders::new(http)
        .with_webhook_options(config.webhook.clone())
        .register(&mut builder)?;
    Ok(builder.build())
}

/// Runs one command and returns its output.
///
/// # Errors
///
/// Returns [`RunError`] if the registry cannot be built or the command fails.
pub async fn execute(command: &Command, config: &ValidatedConfig) -> Result<String, RunError> {
    let registry = build_registry(config)?;
    let result = execute_with(command, &registry, config.publish_timeout).await;
    registry.close_all().await;
    result
}

/// Runs one command against an existing registry.
///
/// # Errors
///
/// Returns [`RunError`] if an input cannot be read or the command fails.
pub async fn execute_with(
    command: &Command,
    registry: &Registry,
    publish_timeout: Duration,
) -> Result<String, RunError> {
    match command {
        Command::Init { .. } => Ok(String::new()),
        Command::Providers { provider_type } => list_providers(registry, provider_type.as_deref()),
        Command::Validate { destination } => {
            let destination: Destination = read_json(destination)?;
            registry.validate_destination(&destination)?;
            tracing::info!(destination_id = %destination.id, "Destination is valid");
            Ok(format!("Destination '{}' is valid", destination.id))
        }
        Command::Target { destination } => {
            let destination: Destination = read_json(destination)?;
            let display = registry.display_destination(&destination)?;
            render(&display)
        }
        Command::Publish {
            destination, event, ..
        } => {
            let destination: Destination = read_json(destination)?;
            let event: Event = read_json(event)?;
            publish(registry, &destination, &event, publish_timeout).await
        }
    }
}

fn list_providers(registry: &Registry, provider_type: Option<&str>) -> Result<String, RunError> {
    if let Some(provider_type) = provider_type {
        return render(registry.retrieve_provider_metadata(provider_type)?);
    }

    let lines: Vec<String> = registry
        .list_provider_metadata()
        .into_iter()
        .map(|m| format!("{:<12} {}", m.provider_type, m.label))
        .collect();
    Ok(lines.join("\n"))
}

async fn publish(
    registry: &Registry,
    destination: &Destination,
    event: &Event,
    timeout: Duration,
) -> Result<String, RunError> {
    registry.validate_destination(destination)?;

    let ctx = CallContext::with_timeout(timeout);
    tracing::debug!(
        destination_id = %destination.id,
        event_id = %event.id,
        timeout_secs = timeout.as_secs(),
        "Publishing event"
    );

    match registry.publish_event(&ctx, destination, event).await {
        Ok(delivery) => render(&delivery),
        Err(error) => {
            let delivery = error
                .delivery()
                .and_then(|d| serde_json::to_string_pretty(d).ok());
            Err(RunError::Publish { error, delivery })
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RunError> {
    let content = std::fs::read_to_string(path).map_err(|e| RunError::ReadInput {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| RunError::ParseInput {
        path: path.to_path_buf(),
        source: e,
    })
}

fn render<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, RunError> {
    serde_json::to_string_pretty(value).map_err(RunError::Render)
}
