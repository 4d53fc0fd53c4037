//! Completion pollers for resources that settle asynchronously.

use async_trait::async_trait;

use super::poller::{Poll, PollOutcome};
use super::steps::StepContext;
use crate::db::models::{Health, StepKey, StepUpdate};
use crate::provider::addon_status;
use crate::provider::blueprint::{AddonKind, SERVICE_ID, SETUP_JOB_ID};
use crate::result_ext::ResultExt;

fn timed_out(resource: &str) -> StepUpdate {
    StepUpdate::health(Health::Failed).with_message(format!("Timed out waiting for {}", resource))
}

/// Follows the service build and then its containers.
pub struct ServicePoller {
    ctx: StepContext,
    project: String,
}

impl ServicePoller {
    pub fn new(ctx: StepContext, project: &str) -> Self {
        Self {
            ctx,
            project: project.to_string(),
        }
    }

    async fn record(&self, update: StepUpdate) {
        let _ = self
            .ctx
            .record(&self.project, StepKey::Service, update)
            .await
            .log("service poller ledger write");
    }
}

#[async_trait]
impl Poll for ServicePoller {
    async fn tick(&mut self) -> PollOutcome {
        let build = self
            .ctx
            .api
            .get_service_builds(&self.project, SERVICE_ID)
            .await
            .log("service poller build status")
            .ok()
            .and_then(|builds| builds.into_iter().next())
            .and_then(|b| b.status);

        match build.as_deref() {
            Some("STARTING") => self.record(StepUpdate::health(Health::BuildStarting)).await,
            Some("CLONING") => self.record(StepUpdate::health(Health::BuildCloning)).await,
            Some("BUILDING") => self.record(StepUpdate::health(Health::Building)).await,
            Some("UPLOADING") => self.record(StepUpdate::health(Health::BuildUploading)).await,
            Some("FAILURE") => {
                self.record(StepUpdate::health(Health::Failed).with_message("Build failed"))
                    .await;
                return PollOutcome::Done;
            }
            _ => {}
        }

        let container = self
            .ctx
            .api
            .get_service_containers(&self.project, SERVICE_ID)
            .await
            .log("service poller container status")
            .ok()
            .and_then(|pods| pods.into_iter().last())
            .and_then(|pod| pod.status);

        match container.as_deref() {
            Some("TASK_STARTING") => {
                self.record(StepUpdate::health(Health::ContainerStarting))
                    .await;
                PollOutcome::Continue
            }
            Some("TASK_RUNNING") => {
                self.record(StepUpdate::health(Health::Success)).await;
                tracing::info!(project = %self.project, "Service running");
                PollOutcome::Done
            }
            _ => PollOutcome::Continue,
        }
    }

    async fn on_exhausted(&mut self) {
        self.record(timed_out("service")).await;
    }
}

/// Follows the object-store addon and runs the setup job once it is usable.
pub struct StoreAddonPoller {
    ctx: StepContext,
    project: String,
    triggered: bool,
}

impl StoreAddonPoller {
    pub fn new(ctx: StepContext, project: &str) -> Self {
        Self {
            ctx,
            project: project.to_string(),
            triggered: false,
        }
    }

    async fn record(&self, update: StepUpdate) {
        let _ = self
            .ctx
            .record(&self.project, StepKey::Minio, update)
            .await
            .log("store addon poller ledger write");
    }

    async fn setup_job_concluded(&self) -> bool {
        self.ctx
            .api
            .get_job_builds(&self.project, SETUP_JOB_ID)
            .await
            .log("store addon poller job build")
            .ok()
            .and_then(|builds| builds.into_iter().next())
            .is_some_and(|b| b.concluded)
    }
}

#[async_trait]
impl Poll for StoreAddonPoller {
    async fn tick(&mut self) -> PollOutcome {
        let kind = AddonKind::Minio;
        let Ok(details) = self
            .ctx
            .api
            .get_addon_details(&self.project, kind.id())
            .await
            .log("store addon poller details")
        else {
            return PollOutcome::Continue;
        };

        let status = addon_status(&details).map(str::to_string);
        let _ = self
            .ctx
            .ledger
            .attach_detail(&self.project, kind.details_field(), details)
            .await
            .log("store addon poller details write");

        match status.as_deref() {
            Some("failed") => {
                self.record(StepUpdate::health(Health::Failed).with_message("Creation failed"))
                    .await;
                PollOutcome::Done
            }
            Some("triggerAllocation") => {
                self.record(StepUpdate::health(Health::Staging)).await;
                PollOutcome::Continue
            }
            Some("running") => {
                // The bucket can only be configured once the setup job is built.
                if !self.setup_job_concluded().await {
                    return PollOutcome::Continue;
                }

                let prior = self
                    .ctx
                    .ledger
                    .get_project(&self.project)
                    .await
                    .log("store addon poller prior health")
                    .ok()
                    .and_then(|p| p.health(kind.step_key()));

                self.record(StepUpdate::health(Health::Success)).await;

                if !self.triggered && prior != Some(Health::Success) {
                    self.triggered = true;
                    let _ = self
                        .ctx
                        .trigger_setup_job(&self.project)
                        .await
                        .log("store addon poller setup job");
                }
                PollOutcome::Done
            }
            _ => PollOutcome::Continue,
        }
    }

    async fn on_exhausted(&mut self) {
        self.record(timed_out("minio")).await;
    }
}

/// Follows the relational-db addon.
pub struct DatabaseAddonPoller {
    ctx: StepContext,
    project: String,
}

impl DatabaseAddonPoller {
    pub fn new(ctx: StepContext, project: &str) -> Self {
        Self {
            ctx,
            project: project.to_string(),
        }
    }

    async fn record(&self, update: StepUpdate) {
        let _ = self
            .ctx
            .record(&self.project, StepKey::Postgresql, update)
            .await
            .log("database addon poller ledger write");
    }
}

#[async_trait]
impl Poll for DatabaseAddonPoller {
    async fn tick(&mut self) -> PollOutcome {
        let kind = AddonKind::Postgresql;
        let Ok(details) = self
            .ctx
            .api
            .get_addon_details(&self.project, kind.id())
            .await
            .log("database addon poller details")
        else {
            return PollOutcome::Continue;
        };

        let status = addon_status(&details).map(str::to_string);
        let _ = self
            .ctx
            .ledger
            .attach_detail(&self.project, kind.details_field(), details)
            .await
            .log("database addon poller details write");

        match status.as_deref() {
            Some("triggerAllocation") => {
                self.record(StepUpdate::health(Health::Staging)).await;
                PollOutcome::Continue
            }
            Some("running") => {
                self.record(StepUpdate::health(Health::Success)).await;
                PollOutcome::Done
            }
            Some("failed") => {
                self.record(StepUpdate::health(Health::Failed).with_message("Creation failed"))
                    .await;
                PollOutcome::Done
            }
            _ => PollOutcome::Continue,
        }
    }

    async fn on_exhausted(&mut self) {
        self.record(timed_out("postgresql")).await;
    }
}

/// Verifies the subdomain, then binds it to the service.
pub struct DomainPoller {
    ctx: StepContext,
    project: String,
    subdomain: String,
    attempts: u32,
    max_attempts: u32,
}

impl DomainPoller {
    pub fn new(ctx: StepContext, project: &str, subdomain: &str, max_attempts: u32) -> Self {
        Self {
            ctx,
            project: project.to_string(),
            subdomain: subdomain.to_string(),
            attempts: 0,
            max_attempts,
        }
    }
}

#[async_trait]
impl Poll for DomainPoller {
    async fn tick(&mut self) -> PollOutcome {
        let domain = self.ctx.blueprint.domain_name.clone();
        match self.ctx.api.verify_subdomain(&domain, &self.subdomain).await {
            Ok(_) => {
                tracing::info!(project = %self.project, subdomain = %self.subdomain, "Subdomain verified");
                let _ = self
                    .ctx
                    .assign_subdomain(&self.project, &self.subdomain)
                    .await
                    .log("domain poller assignment");
                PollOutcome::Done
            }
            Err(e) => {
                self.attempts += 1;
                tracing::debug!(
                    project = %self.project,
                    attempt = self.attempts,
                    status = e.status,
                    "Subdomain not verified yet"
                );
                if self.attempts < self.max_attempts {
                    return PollOutcome::Continue;
                }
                let _ = self
                    .ctx
                    .record(
                        &self.project,
                        StepKey::Domain,
                        StepUpdate::failed(e.status, e.message),
                    )
                    .await
                    .log("domain poller ledger write");
                PollOutcome::Done
            }
        }
    }
}
