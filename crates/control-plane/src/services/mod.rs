//! Service layer for the launchpad control plane.
//!
//! Services sit between the HTTP handlers and the ledger, the provisioning
//! API and the orchestrator.

pub mod backup;
pub mod project;

pub use backup::{BackupOutcome, BackupService, OperationFailure};
pub use project::{CreateDeploymentResponse, ProjectService, ReportedHealth};
