//! Deployment API handlers.
//!
//! Starting a deployment and the addon backup pass-through.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::error::AppResult;
use crate::services::{BackupOutcome, BackupService, CreateDeploymentResponse, ProjectService};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    /// Display name typed by the user
    pub public_project_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupAddonRequest {
    pub project_name: String,
    pub addon_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonBackupRequest {
    pub project_name: String,
    pub addon_id: String,
    pub backup_id: String,
}

/// Start a deployment.
///
/// `POST /api/deploy/create-deployment`
///
/// Allocates the project name and answers before any provisioning happens.
///
/// # Request Body
///
/// ```json
/// { "publicProjectName": "My Blog!" }
/// ```
///
/// # Response
///
/// `202 Accepted`
///
/// ```json
/// { "success": true, "slug": "my-blog" }
/// ```
///
/// `422` when the name yields no valid slug.
pub async fn create_deployment(
    State(service): State<ProjectService>,
    Json(request): Json<CreateDeploymentRequest>,
) -> AppResult<(StatusCode, Json<CreateDeploymentResponse>)> {
    let response = service
        .create_deployment(&request.public_project_name)
        .await?;
    tracing::info!(slug = %response.slug, "Deployment accepted");
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Back up an addon.
///
/// `POST /api/deploy/backup-addon`
///
/// ```json
/// { "projectName": "my-blog", "addonId": "postgresql" }
/// ```
///
/// Returns the platform's backup, or
/// `{"error": true, "code": 409, "message": "...", "apiResponse": {...}}`.
pub async fn backup_addon(
    State(service): State<BackupService>,
    Json(request): Json<BackupAddonRequest>,
) -> Json<BackupOutcome> {
    Json(service.backup(&request.project_name, &request.addon_id).await)
}

/// Restore an addon from a backup.
///
/// `POST /api/deploy/restore-addon-backup`
///
/// ```json
/// { "projectName": "my-blog", "addonId": "postgresql", "backupId": "b-1700000000000" }
/// ```
pub async fn restore_addon_backup(
    State(service): State<BackupService>,
    Json(request): Json<AddonBackupRequest>,
) -> Json<BackupOutcome> {
    Json(
        service
            .restore(&request.project_name, &request.addon_id, &request.backup_id)
            .await,
    )
}

/// Delete an addon backup.
///
/// `POST /api/deploy/delete-addon-backup`
pub async fn delete_addon_backup(
    State(service): State<BackupService>,
    Json(request): Json<AddonBackupRequest>,
) -> Json<BackupOutcome> {
    Json(
        service
            .delete(&request.project_name, &request.addon_id, &request.backup_id)
            .await,
    )
}
