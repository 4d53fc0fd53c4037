//! Progress ledger.
//!
//! The ledger is the only durable state of a deployment: every step,
//! poller and refresh writes into it, and every HTTP read comes out of it.
//! Writes are per key; two writers touching different keys of the same
//! project never lose each other's update.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Backup, DetailField, NewProject, Project, StepKey, StepUpdate};
use crate::naming;

/// Ledger failures.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Project {project} has no step {key}")]
    StepNotFound { project: String, key: StepKey },

    #[error("Invalid project name: {0:?}")]
    InvalidName(String),

    /// The exact name is already taken.
    #[error("Project name already taken: {0}")]
    NameConflict(String),

    #[error("No free project name for {base} after {attempts} attempts")]
    AllocationExhausted { base: String, attempts: u32 },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable per-project record of step health and resource metadata.
#[async_trait]
pub trait ProgressLedger: Send + Sync {
    /// Insert a project with every step at NOT_STARTED.
    ///
    /// Fails with [`LedgerError::NameConflict`] when the name exists.
    async fn insert_project(&self, project: &NewProject) -> LedgerResult<()>;

    /// Allocate a unique name for `public_name` and insert the project.
    ///
    /// Tries `slug`, `slug1`, `slug2`, ... and relies on the insert itself to
    /// reject taken names, so concurrent callers never share a name.
    async fn create_project(&self, public_name: &str) -> LedgerResult<String> {
        let base = naming::normalize(public_name)
            .ok_or_else(|| LedgerError::InvalidName(public_name.to_string()))?;

        for candidate in naming::candidates(&base) {
            if naming::is_reserved(&candidate) {
                continue;
            }
            match self
                .insert_project(&NewProject::new(&candidate, public_name))
                .await
            {
                Ok(()) => {
                    tracing::info!(project = %candidate, public_name, "Project created");
                    return Ok(candidate);
                }
                Err(LedgerError::NameConflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(LedgerError::AllocationExhausted {
            base,
            attempts: naming::MAX_ALLOCATION_ATTEMPTS,
        })
    }

    /// Update one step in place. Never creates a step.
    async fn record_step(
        &self,
        project_name: &str,
        key: StepKey,
        update: &StepUpdate,
    ) -> LedgerResult<()>;

    /// Replace one detail blob.
    async fn attach_detail(
        &self,
        project_name: &str,
        field: DetailField,
        value: serde_json::Value,
    ) -> LedgerResult<()>;

    async fn get_project(&self, project_name: &str) -> LedgerResult<Project>;

    /// All projects, most recently created first.
    async fn list_projects(&self) -> LedgerResult<Vec<Project>>;

    /// Store backups newest first. `backups` is in upstream order.
    async fn set_backups(&self, project_name: &str, backups: Vec<Backup>) -> LedgerResult<()>;

    /// Store the restores of one backup newest first. `restores` is in upstream order.
    async fn set_backup_restores(
        &self,
        project_name: &str,
        backup_id: &str,
        restores: Vec<serde_json::Value>,
    ) -> LedgerResult<()>;

    /// Whether the backing store is reachable.
    async fn ping(&self) -> bool;
}
