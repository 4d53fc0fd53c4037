//! Remote collaborators: the provisioning platform and the DNS provider.
//!
//! Both sit behind traits so the engine can be driven by scripted fakes in
//! tests and by the HTTP clients in production.

pub mod blueprint;
mod dns;
mod northflank;

pub use dns::{CloudflareDns, DnsProvider, DnsRecord};
pub use northflank::NorthflankClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db::models::Backup;

/// Error returned by the provisioning API.
///
/// `status` is the upstream HTTP status, or 0 when the request never got a
/// response.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("upstream {status}: {message}")]
pub struct UpstreamError {
    pub status: u16,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Connection, timeout or other transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    /// Worth retrying: no response, request timeout, rate limit or 5xx.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, 0 | 408 | 429) || (500..600).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

pub type ApiResult<T> = Result<T, UpstreamError>;

/// DNS record the platform asks us to create for a new subdomain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdomainRecord {
    pub record_type: String,
    pub full_name: String,
    pub content: String,
}

/// Binding of a verified subdomain to a service port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubdomainAssignment {
    pub project_id: String,
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One build of a service or job, newest first in listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub concluded: bool,
}

/// One container (pod) of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(default)]
    pub status: Option<String>,
}

/// Status string of an addon detail document.
pub fn addon_status(details: &Value) -> Option<&str> {
    details.get("status").and_then(Value::as_str)
}

/// Provisioning platform operations used by the workflow.
///
/// Payloads are built by [`blueprint`]; responses the workflow never
/// inspects are passed through as JSON.
#[async_trait]
pub trait ProvisioningApi: Send + Sync {
    async fn create_project(&self, payload: &Value) -> ApiResult<Value>;

    async fn create_combined_service(&self, project: &str, payload: &Value) -> ApiResult<Value>;

    async fn create_manual_job(&self, project: &str, payload: &Value) -> ApiResult<Value>;

    async fn create_addon(&self, project: &str, payload: &Value) -> ApiResult<Value>;

    async fn create_secret_group(&self, project: &str, payload: &Value) -> ApiResult<Value>;

    async fn add_subdomain(&self, domain: &str, subdomain: &str) -> ApiResult<SubdomainRecord>;

    async fn verify_subdomain(&self, domain: &str, subdomain: &str) -> ApiResult<Value>;

    async fn assign_subdomain(
        &self,
        domain: &str,
        subdomain: &str,
        assignment: &SubdomainAssignment,
    ) -> ApiResult<Value>;

    async fn get_service_ports(&self, project: &str, service: &str) -> ApiResult<Vec<ServicePort>>;

    async fn get_service_builds(&self, project: &str, service: &str) -> ApiResult<Vec<BuildInfo>>;

    async fn get_service_containers(
        &self,
        project: &str,
        service: &str,
    ) -> ApiResult<Vec<ContainerInfo>>;

    async fn get_service_details(&self, project: &str, service: &str) -> ApiResult<Value>;

    async fn get_job_builds(&self, project: &str, job: &str) -> ApiResult<Vec<BuildInfo>>;

    async fn start_job_run(&self, project: &str, job: &str) -> ApiResult<Value>;

    async fn get_addon_details(&self, project: &str, addon: &str) -> ApiResult<Value>;

    async fn get_addon_credentials(&self, project: &str, addon: &str) -> ApiResult<Value>;

    async fn backup_addon(&self, project: &str, addon: &str, name: &str) -> ApiResult<Value>;

    async fn list_addon_backups(&self, project: &str, addon: &str) -> ApiResult<Vec<Backup>>;

    async fn get_addon_backup(&self, project: &str, addon: &str, backup: &str)
        -> ApiResult<Value>;

    async fn restore_addon_backup(
        &self,
        project: &str,
        addon: &str,
        backup: &str,
    ) -> ApiResult<Value>;

    async fn delete_addon_backup(
        &self,
        project: &str,
        addon: &str,
        backup: &str,
    ) -> ApiResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [0, 408, 429, 500, 502, 503, 599] {
            assert!(UpstreamError::new(status, "x").is_transient(), "{status}");
        }
        for status in [400, 401, 403, 404, 409, 422] {
            assert!(!UpstreamError::new(status, "x").is_transient(), "{status}");
        }
        assert!(UpstreamError::new(404, "gone").is_not_found());
    }

    #[test]
    fn test_subdomain_record_shape() {
        let record: SubdomainRecord = serde_json::from_value(serde_json::json!({
            "recordType": "CNAME",
            "fullName": "my-blog.strapi.run",
            "content": "lb.northflank.app",
            "verified": false
        }))
        .unwrap();
        assert_eq!(record.record_type, "CNAME");
        assert_eq!(record.full_name, "my-blog.strapi.run");
    }

    #[test]
    fn test_addon_status() {
        let details = serde_json::json!({ "id": "minio", "status": "running" });
        assert_eq!(addon_status(&details), Some("running"));
        assert_eq!(addon_status(&serde_json::json!({})), None);
    }
}
