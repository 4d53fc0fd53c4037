//! Provisioning engine.
//!
//! - **Steps**: one operation against the provisioning API plus its ledger writes
//! - **Pollers**: recurring checks for resources that settle asynchronously
//! - **Orchestrator**: runs the steps in dependency order and arms pollers

pub mod orchestrator;
pub mod poller;
pub mod pollers;
pub mod steps;

pub use orchestrator::{OrchestratorTiming, ProvisioningOrchestrator, WorkflowLevel, WorkflowReport};
pub use poller::{Poll, PollOutcome, PollSchedule, PollerKey, PollerRegistry};
pub use steps::{StepContext, StepError, StepErrorKind};
