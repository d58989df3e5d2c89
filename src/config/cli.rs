//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dest-registry: destination provider registry
///
/// Validates destination configurations and delivers events through the
/// registered providers.
#[derive(Debug, Parser)]
#[command(name = "dest-registry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Directory with provider metadata overrides
    #[arg(long = "metadata-path", global = true)]
    pub metadata_path: Option<String>,

    /// Prefix for webhook system and metadata headers
    #[arg(long = "header-prefix", global = true)]
    pub header_prefix: Option<String>,

    /// Outbound HTTP timeout in seconds
    #[arg(long = "http-timeout", global = true)]
    pub http_timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for dest-registry
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = super::defaults::CONFIG_FILE)]
        output: PathBuf,
    },

    /// List registered providers, or print one provider's metadata
    Providers {
        /// Provider type to print in full
        #[arg(long = "type")]
        provider_type: Option<String>,
    },

    /// Validate a destination JSON file
    Validate {
        /// Destination JSON file
        #[arg(long, short)]
        destination: PathBuf,
    },

    /// Print a destination's masked configuration and target
    Target {
        /// Destination JSON file
        #[arg(long, short)]
        destination: PathBuf,
    },

    /// Publish one event to a destination
    Publish {
        /// Destination JSON file
        #[arg(long, short)]
        destination: PathBuf,

        /// Event JSON file
        #[arg(long, short)]
        event: PathBuf,

        /// Deadline for the publish call in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Command::Init { .. })
    }

    /// Returns the publish timeout given on the command line, if any.
    #[must_use]
    pub const fn publish_timeout(&self) -> Option<u64> {
        match self.command {
            Command::Publish { timeout, .. } => timeout,
            _ => None,
        }
    }
}
