//! Resource steps.
//!
//! Each step performs one operation against the provisioning API and writes
//! its own outcome to the ledger before returning. On failure the step has
//! already recorded FAILED with the upstream status and message; callers only
//! need to stop.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::db::models::{Health, StepKey, StepUpdate};
use crate::ledger::{LedgerError, ProgressLedger};
use crate::provider::blueprint::{AddonKind, Blueprint, SERVICE_ID, SETUP_JOB_ID};
use crate::provider::{
    DnsProvider, DnsRecord, ProvisioningApi, SubdomainAssignment, SubdomainRecord, UpstreamError,
};
use crate::retry::{call_with_retry, RetryError, RetryPolicy};

pub const DNS_FAILURE_MESSAGE: &str = "Could not configure domain on DNS provider";

#[derive(Error, Debug)]
pub enum StepErrorKind {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("resource still not visible after {attempts} attempts: {last}")]
    DependencyNotYetVisible { attempts: u32, last: UpstreamError },

    #[error("DNS provider failure: {0}")]
    Dns(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Failure of one step, tagged with its ledger key.
#[derive(Error, Debug)]
#[error("step {key} failed: {kind}")]
pub struct StepError {
    pub key: StepKey,
    pub kind: StepErrorKind,
}

impl StepError {
    pub fn new(key: StepKey, kind: impl Into<StepErrorKind>) -> Self {
        Self {
            key,
            kind: kind.into(),
        }
    }

    /// Upstream status code, if the failure came from the platform.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            StepErrorKind::Upstream(e) => Some(e.status),
            StepErrorKind::DependencyNotYetVisible { last, .. } => Some(last.status),
            StepErrorKind::Dns(_) => Some(500),
            StepErrorKind::Ledger(_) => None,
        }
    }
}

/// Collaborators shared by every step and poller.
#[derive(Clone)]
pub struct StepContext {
    pub api: Arc<dyn ProvisioningApi>,
    pub dns: Arc<dyn DnsProvider>,
    pub ledger: Arc<dyn ProgressLedger>,
    /// Policy for resource creation calls.
    pub retry: RetryPolicy,
    /// Policy for binding a subdomain to a service that may not be visible yet.
    pub assignment_retry: RetryPolicy,
    pub blueprint: Blueprint,
}

impl StepContext {
    pub async fn record(
        &self,
        project: &str,
        key: StepKey,
        update: StepUpdate,
    ) -> Result<(), StepError> {
        self.ledger
            .record_step(project, key, &update)
            .await
            .map_err(|e| StepError::new(key, e))
    }

    /// Record FAILED for `key` and build the matching error.
    async fn fail(&self, project: &str, key: StepKey, error: UpstreamError) -> StepError {
        tracing::warn!(project, step = %key, status = error.status, error = %error.message, "Step failed");
        let update = StepUpdate::failed(error.status, error.message.clone());
        match self.record(project, key, update).await {
            Ok(()) => StepError::new(key, error),
            Err(e) => e,
        }
    }

    async fn finish<T>(
        &self,
        project: &str,
        key: StepKey,
        result: Result<T, UpstreamError>,
        health: Health,
    ) -> Result<T, StepError> {
        match result {
            Ok(value) => {
                self.record(project, key, StepUpdate::health(health)).await?;
                tracing::info!(project, step = %key, %health, "Step completed");
                Ok(value)
            }
            Err(e) => Err(self.fail(project, key, e).await),
        }
    }

    pub async fn create_project(&self, project: &str) -> Result<Value, StepError> {
        let payload = self.blueprint.project(project);
        let result = call_with_retry(&self.retry, || self.api.create_project(&payload)).await;
        self.finish(project, StepKey::Project, result, Health::Success)
            .await
    }

    /// Create the compute service. Its build then runs asynchronously.
    pub async fn create_service(&self, project: &str) -> Result<Value, StepError> {
        let payload = self.blueprint.combined_service();
        let result = call_with_retry(&self.retry, || {
            self.api.create_combined_service(project, &payload)
        })
        .await;
        self.finish(project, StepKey::Service, result, Health::InProgress)
            .await
    }

    pub async fn create_job(&self, project: &str) -> Result<Value, StepError> {
        let payload = self.blueprint.setup_job(project);
        let result =
            call_with_retry(&self.retry, || self.api.create_manual_job(project, &payload)).await;
        self.finish(project, StepKey::Job, result, Health::Success)
            .await
    }

    /// Create an addon and return its remote id.
    pub async fn create_addon(&self, project: &str, kind: AddonKind) -> Result<String, StepError> {
        let payload = self.blueprint.addon(kind);
        let result = call_with_retry(&self.retry, || self.api.create_addon(project, &payload)).await;
        let data = self
            .finish(project, kind.step_key(), result, Health::Deploying)
            .await?;

        Ok(data
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(kind.id())
            .to_string())
    }

    /// Add the subdomain and publish its DNS record.
    ///
    /// Leaves the domain at VERIFYING; the caller arms the verification poller.
    pub async fn add_domain(
        &self,
        project: &str,
        subdomain: &str,
    ) -> Result<SubdomainRecord, StepError> {
        let domain = &self.blueprint.domain_name;
        let record = match call_with_retry(&self.retry, || {
            self.api.add_subdomain(domain, subdomain)
        })
        .await
        {
            Ok(record) => record,
            Err(e) => return Err(self.fail(project, StepKey::Domain, e).await),
        };

        let dns_record = DnsRecord {
            record_type: record.record_type.clone(),
            name: record.full_name.clone(),
            content: record.content.clone(),
            ttl: self.dns.ttl(),
        };
        if let Err(e) = self.dns.create_record(&dns_record).await {
            tracing::error!(project, subdomain, error = %e, "DNS record creation failed");
            self.record(
                project,
                StepKey::Domain,
                StepUpdate::failed(500, DNS_FAILURE_MESSAGE),
            )
            .await?;
            return Err(StepError::new(
                StepKey::Domain,
                StepErrorKind::Dns(e.to_string()),
            ));
        }

        self.record(project, StepKey::Domain, StepUpdate::health(Health::Verifying))
            .await?;
        tracing::info!(project, subdomain = %record.full_name, "Subdomain added, verifying");
        Ok(record)
    }

    /// Bind a verified subdomain to the first port of the service.
    ///
    /// The service may not be visible to the domain API yet, so a 404 is
    /// retried under `assignment_retry`.
    pub async fn assign_subdomain(&self, project: &str, subdomain: &str) -> Result<(), StepError> {
        let ports = match self.api.get_service_ports(project, SERVICE_ID).await {
            Ok(ports) => ports,
            Err(e) => return Err(self.fail(project, StepKey::Domain, e).await),
        };

        let assignment = SubdomainAssignment {
            project_id: project.to_string(),
            service_id: SERVICE_ID.to_string(),
            port_name: ports.into_iter().next().map(|p| p.name),
        };
        let domain = &self.blueprint.domain_name;

        let result = self
            .assignment_retry
            .run(|attempt| {
                let assignment = &assignment;
                async move {
                    match self.api.assign_subdomain(domain, subdomain, assignment).await {
                        Ok(value) => Ok(value),
                        Err(e) if e.is_not_found() => {
                            tracing::debug!(project, subdomain, attempt, "Service not visible yet");
                            Err(RetryError::Retry(e))
                        }
                        Err(e) => Err(RetryError::Abort(e)),
                    }
                }
            })
            .await;

        match result {
            Ok(_) => {
                self.record(project, StepKey::Domain, StepUpdate::health(Health::Success))
                    .await?;
                tracing::info!(project, subdomain, "Subdomain assigned");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                let attempts = self.assignment_retry.max_retries + 1;
                self.record(
                    project,
                    StepKey::Domain,
                    StepUpdate::failed(e.status, e.message.clone()),
                )
                .await?;
                Err(StepError::new(
                    StepKey::Domain,
                    StepErrorKind::DependencyNotYetVisible { attempts, last: e },
                ))
            }
            Err(e) => Err(self.fail(project, StepKey::Domain, e).await),
        }
    }

    pub async fn create_secret_group(
        &self,
        project: &str,
        minio_id: &str,
        postgresql_id: &str,
    ) -> Result<Value, StepError> {
        let payload = self.blueprint.secret_group(minio_id, postgresql_id);
        let result = call_with_retry(&self.retry, || {
            self.api.create_secret_group(project, &payload)
        })
        .await;
        self.finish(project, StepKey::Secrets, result, Health::Success)
            .await
    }

    /// Fetch addon credentials and attach them as connection details.
    pub async fn fetch_credentials(&self, project: &str, kind: AddonKind) -> Result<(), StepError> {
        let key = kind.fetch_key();
        let credentials = match self.api.get_addon_credentials(project, kind.id()).await {
            Ok(credentials) => credentials,
            Err(e) => return Err(self.fail(project, key, e).await),
        };

        self.ledger
            .attach_detail(project, kind.connection_field(), credentials)
            .await
            .map_err(|e| StepError::new(key, e))?;
        self.record(project, key, StepUpdate::health(Health::Success))
            .await?;
        tracing::info!(project, addon = kind.id(), "Credentials fetched");
        Ok(())
    }

    /// Run the setup job that creates the bucket and its policy.
    ///
    /// On failure both bucket steps are recorded FAILED.
    pub async fn trigger_setup_job(&self, project: &str) -> Result<Value, StepError> {
        let result =
            call_with_retry(&self.retry, || self.api.start_job_run(project, SETUP_JOB_ID)).await;

        match result {
            Ok(run) => {
                tracing::info!(project, job = SETUP_JOB_ID, "Setup job started");
                Ok(run)
            }
            Err(e) => {
                tracing::warn!(project, status = e.status, error = %e.message, "Setup job run failed");
                for key in [StepKey::BucketCreated, StepKey::BucketPolicy] {
                    self.record(project, key, StepUpdate::failed(e.status, e.message.clone()))
                        .await?;
                }
                Err(StepError::new(StepKey::BucketCreated, e))
            }
        }
    }
}
