//! Addon backup pass-through.
//!
//! Backups are not part of the provisioning workflow, so nothing here
//! touches the ledger. The next project refresh picks up the result.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::provider::{ProvisioningApi, UpstreamError};

/// Failure body returned to the caller in place of upstream data.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub error: bool,
    pub code: u16,
    pub message: String,
    pub api_response: UpstreamError,
}

impl OperationFailure {
    fn new(message: &str, error: UpstreamError) -> Self {
        Self {
            error: true,
            code: error.status,
            message: message.to_string(),
            api_response: error,
        }
    }
}

/// Upstream data on success, a failure body otherwise.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BackupOutcome {
    Data(Value),
    Failed(OperationFailure),
}

impl BackupOutcome {
    fn from_result(result: Result<Value, UpstreamError>, message: &str) -> Self {
        match result {
            Ok(data) => BackupOutcome::Data(data),
            Err(e) => {
                tracing::warn!(status = e.status, error = %e, "{}", message);
                BackupOutcome::Failed(OperationFailure::new(message, e))
            }
        }
    }
}

/// Service for addon backup operations.
#[derive(Clone)]
pub struct BackupService {
    api: Arc<dyn ProvisioningApi>,
}

impl BackupService {
    pub fn new(api: Arc<dyn ProvisioningApi>) -> Self {
        Self { api }
    }

    /// Start a backup named after the current time.
    pub async fn backup(&self, project_name: &str, addon_id: &str) -> BackupOutcome {
        let name = format!("b-{}", Utc::now().timestamp_millis());
        tracing::info!(project = project_name, addon = addon_id, backup = %name, "Backing up addon");
        let result = self.api.backup_addon(project_name, addon_id, &name).await;
        BackupOutcome::from_result(result, "Could not back up addon")
    }

    pub async fn restore(&self, project_name: &str, addon_id: &str, backup_id: &str) -> BackupOutcome {
        tracing::info!(project = project_name, addon = addon_id, backup = backup_id, "Restoring addon backup");
        let result = self
            .api
            .restore_addon_backup(project_name, addon_id, backup_id)
            .await;
        BackupOutcome::from_result(result, "Could not restore addon backup")
    }

    pub async fn delete(&self, project_name: &str, addon_id: &str, backup_id: &str) -> BackupOutcome {
        tracing::info!(project = project_name, addon = addon_id, backup = backup_id, "Deleting addon backup");
        let result = self
            .api
            .delete_addon_backup(project_name, addon_id, backup_id)
            .await;
        BackupOutcome::from_result(result, "Could not delete addon backup")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use serde_json::json;

    #[tokio::test]
    async fn test_backup_name_uses_timestamp() {
        let api = Arc::new(FakeApi::default());
        let service = BackupService::new(api.clone());

        let BackupOutcome::Data(data) = service.backup("shop", "postgresql").await else {
            panic!("expected data");
        };
        let name = data["name"].as_str().unwrap();
        assert!(name.starts_with("b-"));
        assert!(name[2..].parse::<i64>().is_ok());
        assert_eq!(api.calls("backup_addon"), 1);
    }

    #[tokio::test]
    async fn test_restore_passes_data_through() {
        let service = BackupService::new(Arc::new(FakeApi::default()));
        let outcome = service.restore("shop", "postgresql", "b-1").await;
        assert_eq!(
            outcome,
            BackupOutcome::Data(json!({ "backupId": "b-1", "status": "restoring" }))
        );
    }

    #[tokio::test]
    async fn test_failure_body() {
        let api = Arc::new(FakeApi::default());
        api.fail("delete_addon_backup", UpstreamError::new(409, "Backup in use"));
        let service = BackupService::new(api);

        let outcome = service.delete("shop", "postgresql", "b-1").await;
        let body = serde_json::to_value(&outcome).unwrap();
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], 409);
        assert_eq!(body["message"], "Could not delete addon backup");
        assert_eq!(body["apiResponse"]["message"], "Backup in use");
    }
}
