//! Scripted fakes of the remote collaborators, shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::db::models::Backup;
use crate::engine::StepContext;
use crate::ledger::MemoryLedger;
use crate::provider::blueprint::Blueprint;
use crate::provider::{
    ApiResult, BuildInfo, ContainerInfo, DnsProvider, DnsRecord, ProvisioningApi, ServicePort,
    SubdomainAssignment, SubdomainRecord, UpstreamError,
};
use crate::retry::RetryPolicy;

#[derive(Default)]
struct State {
    calls: HashMap<&'static str, u32>,
    /// Failures consumed one per call.
    queued: HashMap<&'static str, VecDeque<UpstreamError>>,
    /// Failures returned on every call.
    sticky: HashMap<&'static str, UpstreamError>,
    /// `create_addon` failures keyed by lowercased addon name.
    addon_failures: HashMap<String, VecDeque<UpstreamError>>,
    addon_calls: HashMap<String, u32>,
    /// Addon statuses; the last one sticks.
    addon_status: HashMap<String, VecDeque<String>>,
    job_concluded: bool,
    build_status: Option<String>,
    container_status: Option<String>,
    assignments: Vec<SubdomainAssignment>,
    backups: Vec<Backup>,
}

/// In-memory provisioning platform.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<State>,
}

impl FakeApi {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Fail every call to `op`.
    pub fn fail(&self, op: &'static str, error: UpstreamError) {
        self.state().sticky.insert(op, error);
    }

    /// Fail the next `times` calls to `op`.
    pub fn fail_times(&self, op: &'static str, times: usize, error: UpstreamError) {
        let mut state = self.state();
        let queue = state.queued.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Fail the next `times` `create_addon` calls for the addon named `addon`.
    pub fn fail_addon(&self, addon: &str, times: usize, error: UpstreamError) {
        let mut state = self.state();
        let queue = state.addon_failures.entry(addon.to_lowercase()).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// `create_addon` calls made for the addon named `addon`.
    pub fn addon_calls(&self, addon: &str) -> u32 {
        self.state()
            .addon_calls
            .get(&addon.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    pub fn calls(&self, op: &str) -> u32 {
        self.state().calls.get(op).copied().unwrap_or_default()
    }

    pub fn set_addon_status(&self, addon: &str, statuses: &[&str]) {
        self.state().addon_status.insert(
            addon.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn set_job_concluded(&self, concluded: bool) {
        self.state().job_concluded = concluded;
    }

    pub fn set_service_status(&self, build: Option<&str>, container: Option<&str>) {
        let mut state = self.state();
        state.build_status = build.map(str::to_string);
        state.container_status = container.map(str::to_string);
    }

    pub fn set_backups(&self, backups: Vec<Backup>) {
        self.state().backups = backups;
    }

    pub fn assignments(&self) -> Vec<SubdomainAssignment> {
        self.state().assignments.clone()
    }

    fn enter(&self, op: &'static str) -> ApiResult<()> {
        let mut state = self.state();
        *state.calls.entry(op).or_default() += 1;
        if let Some(error) = state.queued.get_mut(op).and_then(VecDeque::pop_front) {
            return Err(error);
        }
        match state.sticky.get(op) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProvisioningApi for FakeApi {
    async fn create_project(&self, payload: &Value) -> ApiResult<Value> {
        self.enter("create_project")?;
        Ok(json!({ "id": payload["name"] }))
    }

    async fn create_combined_service(&self, _project: &str, _payload: &Value) -> ApiResult<Value> {
        self.enter("create_combined_service")?;
        Ok(json!({ "id": "strapi" }))
    }

    async fn create_manual_job(&self, _project: &str, payload: &Value) -> ApiResult<Value> {
        self.enter("create_manual_job")?;
        Ok(json!({ "id": payload["name"] }))
    }

    async fn create_addon(&self, _project: &str, payload: &Value) -> ApiResult<Value> {
        self.enter("create_addon")?;
        let id = payload["name"].as_str().unwrap_or_default().to_lowercase();
        let mut state = self.state();
        *state.addon_calls.entry(id.clone()).or_default() += 1;
        if let Some(error) = state
            .addon_failures
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(json!({ "id": id }))
    }

    async fn create_secret_group(&self, _project: &str, _payload: &Value) -> ApiResult<Value> {
        self.enter("create_secret_group")?;
        Ok(json!({ "id": "strapi" }))
    }

    async fn add_subdomain(&self, domain: &str, subdomain: &str) -> ApiResult<SubdomainRecord> {
        self.enter("add_subdomain")?;
        Ok(SubdomainRecord {
            record_type: "CNAME".to_string(),
            full_name: format!("{}.{}", subdomain, domain),
            content: "lb.platform.example".to_string(),
        })
    }

    async fn verify_subdomain(&self, _domain: &str, subdomain: &str) -> ApiResult<Value> {
        self.enter("verify_subdomain")?;
        Ok(json!({ "subdomain": subdomain, "verified": true }))
    }

    async fn assign_subdomain(
        &self,
        _domain: &str,
        _subdomain: &str,
        assignment: &SubdomainAssignment,
    ) -> ApiResult<Value> {
        self.enter("assign_subdomain")?;
        self.state().assignments.push(assignment.clone());
        Ok(json!({}))
    }

    async fn get_service_ports(&self, _project: &str, _service: &str) -> ApiResult<Vec<ServicePort>> {
        self.enter("get_service_ports")?;
        Ok(vec![ServicePort {
            name: "p1".to_string(),
            extra: serde_json::Map::new(),
        }])
    }

    async fn get_service_builds(&self, _project: &str, _service: &str) -> ApiResult<Vec<BuildInfo>> {
        self.enter("get_service_builds")?;
        let status = self.state().build_status.clone();
        Ok(vec![BuildInfo {
            status,
            concluded: false,
        }])
    }

    async fn get_service_containers(
        &self,
        _project: &str,
        _service: &str,
    ) -> ApiResult<Vec<ContainerInfo>> {
        self.enter("get_service_containers")?;
        let status = self.state().container_status.clone();
        Ok(vec![
            ContainerInfo {
                status: Some("TASK_EXITED".to_string()),
            },
            ContainerInfo { status },
        ])
    }

    async fn get_service_details(&self, _project: &str, service: &str) -> ApiResult<Value> {
        self.enter("get_service_details")?;
        Ok(json!({ "id": service, "name": "Strapi" }))
    }

    async fn get_job_builds(&self, _project: &str, _job: &str) -> ApiResult<Vec<BuildInfo>> {
        self.enter("get_job_builds")?;
        let concluded = self.state().job_concluded;
        Ok(vec![BuildInfo {
            status: Some("SUCCESS".to_string()),
            concluded,
        }])
    }

    async fn start_job_run(&self, _project: &str, _job: &str) -> ApiResult<Value> {
        self.enter("start_job_run")?;
        Ok(json!({ "id": "run-1" }))
    }

    async fn get_addon_details(&self, _project: &str, addon: &str) -> ApiResult<Value> {
        self.enter("get_addon_details")?;
        let mut state = self.state();
        let status = match state.addon_status.get_mut(addon) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
        .unwrap_or_else(|| "running".to_string());
        Ok(json!({ "id": addon, "status": status }))
    }

    async fn get_addon_credentials(&self, _project: &str, addon: &str) -> ApiResult<Value> {
        self.enter("get_addon_credentials")?;
        Ok(json!({
            "envs": { "host": format!("{}.internal", addon) },
            "secrets": { "password": "hunter2" },
        }))
    }

    async fn backup_addon(&self, _project: &str, _addon: &str, name: &str) -> ApiResult<Value> {
        self.enter("backup_addon")?;
        Ok(json!({ "id": name, "name": name }))
    }

    async fn list_addon_backups(&self, _project: &str, _addon: &str) -> ApiResult<Vec<Backup>> {
        self.enter("list_addon_backups")?;
        Ok(self.state().backups.clone())
    }

    async fn get_addon_backup(
        &self,
        _project: &str,
        _addon: &str,
        backup: &str,
    ) -> ApiResult<Value> {
        self.enter("get_addon_backup")?;
        Ok(json!({
            "id": backup,
            "restores": [{ "id": format!("{}-r1", backup) }, { "id": format!("{}-r2", backup) }],
        }))
    }

    async fn restore_addon_backup(
        &self,
        _project: &str,
        _addon: &str,
        backup: &str,
    ) -> ApiResult<Value> {
        self.enter("restore_addon_backup")?;
        Ok(json!({ "backupId": backup, "status": "restoring" }))
    }

    async fn delete_addon_backup(
        &self,
        _project: &str,
        _addon: &str,
        _backup: &str,
    ) -> ApiResult<Value> {
        self.enter("delete_addon_backup")?;
        Ok(json!({}))
    }
}

/// DNS provider that records what it was asked to create.
#[derive(Default)]
pub struct FakeDns {
    failing: Mutex<bool>,
    records: Mutex<Vec<DnsRecord>>,
}

impl FakeDns {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DnsProvider for FakeDns {
    async fn create_record(&self, record: &DnsRecord) -> anyhow::Result<()> {
        if *self.failing.lock().unwrap() {
            anyhow::bail!("zone rejected {}", record.name);
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Step context over the fakes and a fresh in-memory ledger.
pub fn context(api: Arc<FakeApi>, dns: Arc<FakeDns>) -> StepContext {
    StepContext {
        api,
        dns,
        ledger: Arc::new(MemoryLedger::new()),
        retry: RetryPolicy::fixed(3, Duration::from_secs(2)),
        assignment_retry: RetryPolicy::fixed(2, Duration::from_secs(1)),
        blueprint: Blueprint::new("strapi.run", "http://localhost:8080"),
    }
}
