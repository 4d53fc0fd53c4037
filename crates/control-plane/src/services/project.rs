//! Project service: deployment creation, reads, refresh and job reports.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::models::{DetailField, Health, Project, StepKey, StepUpdate};
use crate::engine::ProvisioningOrchestrator;
use crate::error::{AppError, AppResult};
use crate::ledger::{LedgerError, ProgressLedger};
use crate::provider::blueprint::{AddonKind, SERVICE_ID};
use crate::provider::{addon_status, ProvisioningApi};
use crate::result_ext::ResultExt;

/// Names the front end sends before it knows the real project.
const PLACEHOLDER_NAMES: &[&str] = &["[slug]", "undefined"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateDeploymentResponse {
    pub success: bool,
    pub slug: String,
}

/// Health reported by the setup job: a name such as `"SUCCESS"`, or an
/// HTTP-like status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ReportedHealth {
    Named(Health),
    Status(u16),
}

impl ReportedHealth {
    fn into_update(self, message: Option<String>) -> StepUpdate {
        let mut update = match self {
            ReportedHealth::Named(health) => StepUpdate::health(health),
            ReportedHealth::Status(code) if (200..300).contains(&code) => {
                StepUpdate::health(Health::Success)
            }
            ReportedHealth::Status(code) => StepUpdate::failed(code, ""),
        };
        update.message = message;
        update
    }
}

/// Service for project operations.
#[derive(Clone)]
pub struct ProjectService {
    ledger: Arc<dyn ProgressLedger>,
    api: Arc<dyn ProvisioningApi>,
    orchestrator: ProvisioningOrchestrator,
    start_delay: Duration,
}

impl ProjectService {
    pub fn new(orchestrator: ProvisioningOrchestrator, start_delay: Duration) -> Self {
        let ctx = orchestrator.context();
        Self {
            ledger: ctx.ledger.clone(),
            api: ctx.api.clone(),
            orchestrator,
            start_delay,
        }
    }

    /// Create the ledger entry and schedule the provisioning workflow.
    ///
    /// Returns as soon as the project exists; the workflow starts after the
    /// configured start delay on a background task.
    pub async fn create_deployment(&self, public_name: &str) -> AppResult<CreateDeploymentResponse> {
        let slug = self.ledger.create_project(public_name).await?;

        let orchestrator = self.orchestrator.clone();
        let delay = self.start_delay;
        let project = slug.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            orchestrator.execute(&project).await;
        });

        Ok(CreateDeploymentResponse {
            success: true,
            slug,
        })
    }

    pub async fn get(&self, project_name: &str) -> AppResult<Project> {
        Ok(self.ledger.get_project(project_name).await?)
    }

    pub async fn list(&self) -> AppResult<Vec<Project>> {
        Ok(self.ledger.list_projects().await?)
    }

    /// Refresh one project from the platform and return it.
    ///
    /// Placeholder names are answered with not found, unknown projects with
    /// bad request.
    pub async fn fetch(&self, project_name: &str) -> AppResult<Project> {
        if PLACEHOLDER_NAMES.contains(&project_name) {
            return Err(AppError::NotFound(format!(
                "No project for placeholder {}",
                project_name
            )));
        }

        match self.ledger.get_project(project_name).await {
            Ok(_) => {}
            Err(LedgerError::ProjectNotFound(name)) => {
                return Err(AppError::BadRequest(format!("Unknown project: {}", name)));
            }
            Err(e) => return Err(e.into()),
        }

        self.refresh(project_name).await;
        self.get(project_name).await
    }

    /// Re-query the platform for one project without re-running creation.
    ///
    /// Individual failures are logged and skipped.
    pub async fn refresh(&self, project_name: &str) {
        tracing::debug!(project = project_name, "Refreshing project");

        self.refresh_service(project_name).await;
        self.refresh_addon(project_name, AddonKind::Minio).await;
        self.refresh_addon(project_name, AddonKind::Postgresql).await;
        self.refresh_backups(project_name, AddonKind::Postgresql).await;

        let _ = self
            .orchestrator
            .resume_pollers(project_name)
            .await
            .log("refresh resume pollers");
    }

    /// Refresh every project. Returns how many were visited.
    pub async fn refresh_all(&self) -> AppResult<usize> {
        let projects = self.ledger.list_projects().await?;
        for project in &projects {
            self.refresh(&project.project_name).await;
        }
        tracing::info!(count = projects.len(), "Refreshed all projects");
        Ok(projects.len())
    }

    async fn refresh_service(&self, project_name: &str) {
        let build_status = self
            .api
            .get_service_builds(project_name, SERVICE_ID)
            .await
            .ok()
            .and_then(|builds| builds.into_iter().next())
            .and_then(|b| b.status);
        let container_status = self
            .api
            .get_service_containers(project_name, SERVICE_ID)
            .await
            .ok()
            .and_then(|pods| pods.into_iter().last())
            .and_then(|pod| pod.status);

        if container_status.as_deref() == Some("TASK_RUNNING") {
            let _ = self
                .ledger
                .record_step(project_name, StepKey::Service, &StepUpdate::health(Health::Success))
                .await
                .log("refresh service health");
        }

        let details = match self.api.get_service_details(project_name, SERVICE_ID).await {
            Ok(mut details) => {
                if let Some(fields) = details.as_object_mut() {
                    fields.insert("buildStatus".to_string(), json!(build_status));
                    fields.insert("containerStatus".to_string(), json!(container_status));
                }
                details
            }
            Err(e) if e.is_not_found() => json!({}),
            Err(e) => {
                tracing::warn!(project = project_name, error = %e, "Could not get service details");
                return;
            }
        };

        let _ = self
            .ledger
            .attach_detail(project_name, DetailField::ServiceDetails, details)
            .await
            .log("refresh service details");
    }

    async fn refresh_addon(&self, project_name: &str, kind: AddonKind) {
        let details = match self.api.get_addon_details(project_name, kind.id()).await {
            Ok(details) => details,
            Err(e) if e.is_not_found() => json!({}),
            Err(e) => {
                tracing::warn!(project = project_name, addon = kind.id(), error = %e, "Could not get addon details");
                return;
            }
        };

        // The object store only counts as ready once its setup job ran, which
        // is the store poller's call.
        if kind == AddonKind::Postgresql && addon_status(&details) == Some("running") {
            let _ = self
                .ledger
                .record_step(project_name, kind.step_key(), &StepUpdate::health(Health::Success))
                .await
                .log("refresh addon health");
        }

        let _ = self
            .ledger
            .attach_detail(project_name, kind.details_field(), details)
            .await
            .log("refresh addon details");
    }

    async fn refresh_backups(&self, project_name: &str, kind: AddonKind) {
        let Ok(backups) = self
            .api
            .list_addon_backups(project_name, kind.id())
            .await
            .log("refresh list backups")
        else {
            return;
        };

        let ids: Vec<String> = backups.iter().map(|b| b.id.clone()).collect();
        if self
            .ledger
            .set_backups(project_name, backups)
            .await
            .log("refresh store backups")
            .is_err()
        {
            return;
        }

        for backup_id in ids {
            let Ok(backup) = self
                .api
                .get_addon_backup(project_name, kind.id(), &backup_id)
                .await
                .log("refresh backup details")
            else {
                continue;
            };
            let restores = match backup.get("restores") {
                Some(Value::Array(restores)) => restores.clone(),
                _ => Vec::new(),
            };
            let _ = self
                .ledger
                .set_backup_restores(project_name, &backup_id, restores)
                .await
                .log("refresh store restores");
        }
    }

    /// Record a step outcome reported from outside, e.g. by the setup job.
    pub async fn add_response(
        &self,
        project_name: &str,
        key: &str,
        health: ReportedHealth,
        message: Option<String>,
    ) -> AppResult<()> {
        let key: StepKey = key.parse().map_err(AppError::NotFound)?;
        let update = health.into_update(message);

        self.ledger.record_step(project_name, key, &update).await?;
        tracing::info!(project = project_name, step = %key, health = %update.health, "External response recorded");
        Ok(())
    }
}
