//! Provisioning workflow orchestration.
//!
//! Composes the resource steps into a dependency-ordered plan:
//!
//! ```text
//! project
//!  └─▶ { job, service, postgresql, minio }        concurrent
//!        └─▶ settling delay
//!        └─▶ domain (arms the verification poller)
//!        └─▶ secrets
//!              └─▶ { fetchPostgresql, fetchMinio } concurrent
//!                    └─▶ arm service, minio and postgresql pollers
//! ```
//!
//! Every step records its own failure; the orchestrator only marks steps
//! IN_PROGRESS, stops on the first failure and arms pollers.

use std::time::Duration;

use serde::Serialize;

use super::poller::{PollSchedule, PollerKey, PollerRegistry};
use super::pollers::{DatabaseAddonPoller, DomainPoller, ServicePoller, StoreAddonPoller};
use super::steps::{StepContext, StepError};
use crate::db::models::{Health, Project, StepKey, StepUpdate};
use crate::ledger::LedgerResult;
use crate::provider::blueprint::AddonKind;

/// Timers of the workflow and its pollers.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorTiming {
    /// Wait between resource creation and domain setup.
    pub settle_delay: Duration,
    pub service_poll: PollSchedule,
    pub addon_poll: PollSchedule,
    pub domain_poll: PollSchedule,
    /// Failed verifications before the domain is recorded FAILED.
    pub domain_max_attempts: u32,
}

impl Default for OrchestratorTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(3000),
            service_poll: PollSchedule::bounded(Duration::from_secs(10), 360),
            addon_poll: PollSchedule::bounded(Duration::from_secs(10), 360),
            domain_poll: PollSchedule::unbounded(Duration::from_secs(3)),
            domain_max_attempts: 10,
        }
    }
}

/// Stage of the workflow that finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowLevel {
    Project,
    Resources,
    Domain,
    Secrets,
    Credentials,
}

/// What a workflow run got through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub project: String,
    pub completed: Vec<WorkflowLevel>,
    pub armed_pollers: Vec<StepKey>,
}

impl WorkflowReport {
    fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            completed: Vec::new(),
            armed_pollers: Vec::new(),
        }
    }
}

/// Runs provisioning workflows and owns their pollers.
#[derive(Clone)]
pub struct ProvisioningOrchestrator {
    ctx: StepContext,
    registry: PollerRegistry,
    timing: OrchestratorTiming,
}

impl ProvisioningOrchestrator {
    pub fn new(ctx: StepContext, timing: OrchestratorTiming) -> Self {
        Self {
            ctx,
            registry: PollerRegistry::new(),
            timing,
        }
    }

    pub fn context(&self) -> &StepContext {
        &self.ctx
    }

    pub fn registry(&self) -> &PollerRegistry {
        &self.registry
    }

    async fn start(&self, project: &str, key: StepKey) -> Result<(), StepError> {
        self.ctx
            .record(project, key, StepUpdate::health(Health::InProgress))
            .await
    }

    /// Run the whole workflow for an already created project.
    ///
    /// Returns the first step failure. A failed step has already been
    /// recorded in the ledger and nothing downstream of it runs.
    pub async fn run(&self, project: &str) -> Result<WorkflowReport, StepError> {
        let ctx = &self.ctx;
        let mut report = WorkflowReport::new(project);

        self.start(project, StepKey::Project).await?;
        ctx.create_project(project).await?;
        report.completed.push(WorkflowLevel::Project);

        for key in [
            StepKey::Job,
            StepKey::Service,
            StepKey::Postgresql,
            StepKey::Minio,
        ] {
            self.start(project, key).await?;
        }
        let (job, service, postgresql, minio) = tokio::join!(
            ctx.create_job(project),
            ctx.create_service(project),
            ctx.create_addon(project, AddonKind::Postgresql),
            ctx.create_addon(project, AddonKind::Minio),
        );
        job?;
        service?;
        let postgresql_id = postgresql?;
        let minio_id = minio?;
        report.completed.push(WorkflowLevel::Resources);

        tokio::time::sleep(self.timing.settle_delay).await;

        self.start(project, StepKey::Domain).await?;
        let subdomain = ctx
            .ledger
            .get_project(project)
            .await
            .map_err(|e| StepError::new(StepKey::Domain, e))?
            .project_domain;
        ctx.add_domain(project, &subdomain).await?;
        self.arm_domain(project, &subdomain);
        report.armed_pollers.push(StepKey::Domain);
        report.completed.push(WorkflowLevel::Domain);

        self.start(project, StepKey::Secrets).await?;
        ctx.create_secret_group(project, &minio_id, &postgresql_id)
            .await?;
        report.completed.push(WorkflowLevel::Secrets);

        self.start(project, StepKey::FetchMinio).await?;
        self.start(project, StepKey::FetchPostgresql).await?;
        let (postgresql_creds, minio_creds) = tokio::join!(
            ctx.fetch_credentials(project, AddonKind::Postgresql),
            ctx.fetch_credentials(project, AddonKind::Minio),
        );
        postgresql_creds?;
        minio_creds?;
        report.completed.push(WorkflowLevel::Credentials);

        for key in [StepKey::Minio, StepKey::Postgresql, StepKey::Service] {
            self.arm(project, key);
            report.armed_pollers.push(key);
        }

        tracing::info!(project, "Provisioning workflow finished, pollers armed");
        Ok(report)
    }

    /// Run the workflow and log its outcome.
    pub async fn execute(&self, project: &str) {
        match self.run(project).await {
            Ok(report) => {
                tracing::info!(
                    project,
                    armed = report.armed_pollers.len(),
                    "Provisioning accepted by the platform"
                );
            }
            Err(e) => {
                tracing::error!(project, step = %e.key, error = %e, "Provisioning halted");
            }
        }
    }

    fn arm_domain(&self, project: &str, subdomain: &str) {
        self.registry.spawn(
            PollerKey::new(project, StepKey::Domain),
            self.timing.domain_poll,
            DomainPoller::new(
                self.ctx.clone(),
                project,
                subdomain,
                self.timing.domain_max_attempts,
            ),
        );
    }

    fn arm(&self, project: &str, key: StepKey) {
        let poller_key = PollerKey::new(project, key);
        match key {
            StepKey::Service => {
                self.registry.spawn(
                    poller_key,
                    self.timing.service_poll,
                    ServicePoller::new(self.ctx.clone(), project),
                );
            }
            StepKey::Minio => {
                self.registry.spawn(
                    poller_key,
                    self.timing.addon_poll,
                    StoreAddonPoller::new(self.ctx.clone(), project),
                );
            }
            StepKey::Postgresql => {
                self.registry.spawn(
                    poller_key,
                    self.timing.addon_poll,
                    DatabaseAddonPoller::new(self.ctx.clone(), project),
                );
            }
            _ => {}
        }
    }

    /// Re-arm pollers lost with a previous process.
    ///
    /// The domain poller is resumed while the domain is VERIFYING. Service and
    /// addon pollers are resumed while their step is not terminal, once the
    /// workflow got as far as arming them (both credential fetches succeeded).
    pub async fn resume_pollers(&self, project_name: &str) -> LedgerResult<Vec<StepKey>> {
        let project = self.ctx.ledger.get_project(project_name).await?;
        let armed = self.resume_for(&project);
        if !armed.is_empty() {
            tracing::info!(project = project_name, ?armed, "Pollers resumed");
        }
        Ok(armed)
    }

    fn resume_for(&self, project: &Project) -> Vec<StepKey> {
        let name = project.project_name.as_str();
        let is_live = |key| self.registry.is_active(&PollerKey::new(name, key));
        let mut armed = Vec::new();

        if project.health(StepKey::Domain) == Some(Health::Verifying) && !is_live(StepKey::Domain) {
            self.arm_domain(name, &project.project_domain);
            armed.push(StepKey::Domain);
        }

        let pollers_armed = [StepKey::FetchMinio, StepKey::FetchPostgresql]
            .iter()
            .all(|key| project.health(*key) == Some(Health::Success));
        if !pollers_armed {
            return armed;
        }

        for key in [StepKey::Minio, StepKey::Postgresql, StepKey::Service] {
            let pending = project.health(key).is_some_and(|h| !h.is_terminal());
            if pending && !is_live(key) {
                self.arm(name, key);
                armed.push(key);
            }
        }
        armed
    }

    /// Resume pollers of every project. Used at startup.
    pub async fn resume_all(&self) -> LedgerResult<usize> {
        let projects = self.ctx.ledger.list_projects().await?;
        let mut total = 0;
        for project in &projects {
            total += self.resume_for(project).len();
        }
        tracing::info!(projects = projects.len(), pollers = total, "Poller recovery complete");
        Ok(total)
    }

    pub fn shutdown(&self) {
        self.registry.cancel_all();
    }
}
