//! Destination Registry: event fan-out to webhooks, brokers, relays and cloud services
//!
//! A library for validating destination configurations against declarative
//! provider metadata and delivering events through per-destination publishers.

pub mod config;
pub mod context;
pub mod error;
pub mod metadata;
pub mod models;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod time;
pub mod transport;
