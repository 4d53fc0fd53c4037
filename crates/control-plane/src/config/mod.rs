//! Configuration module for the Launchpad Control Plane server.
//!
//! This module provides configuration loading from environment variables
//! using the `envy` crate for type-safe environment variable parsing.

mod app;
mod database;
mod provider;

pub use app::{AppConfig, LedgerBackend};
pub use database::DatabaseConfig;
pub use provider::{DnsConfig, ProviderConfig};
