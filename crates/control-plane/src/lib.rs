//! Launchpad Control Plane Library
//!
//! Provisions hosted Strapi deployments on a container platform and tracks
//! their progress:
//!
//! - **Naming**: turn a display name into a unique deployment slug
//! - **Ledger**: durable per-step progress of every project
//! - **Engine**: run the provisioning steps in dependency order, retry
//!   transient failures and poll resources that settle asynchronously
//! - **Providers**: the provisioning platform and DNS provider clients
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from environment variables
//! - [`db`]: PostgreSQL models, queries and schema behind the ledger
//! - [`engine`]: Steps, pollers and the orchestrator
//! - [`error`]: Custom error types with Axum integration
//! - [`handlers`]: HTTP route handlers
//! - [`ledger`]: The progress ledger trait and its backends
//! - [`provider`]: Provisioning API and DNS provider
//! - [`retry`]: Retry policy for upstream calls
//!
//! ## Example
//!
//! ```ignore
//! use launchpad_control_plane::{engine::ProvisioningOrchestrator, ledger::ProgressLedger};
//!
//! let slug = ctx.ledger.create_project("My Blog!").await?;
//! let orchestrator = ProvisioningOrchestrator::new(ctx, config.timing());
//! orchestrator.execute(&slug).await;
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod naming;
pub mod provider;
pub mod result_ext;
pub mod retry;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::{AppError, AppResult};
pub use result_ext::ResultExt;
