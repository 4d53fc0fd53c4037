//! Callbacks from jobs running on the platform.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::services::{ProjectService, ReportedHealth};

/// Step outcome reported by the setup job.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddResponseRequest {
    pub project_name: String,
    /// Progress step key, e.g. `bucketCreated`
    pub key: String,
    pub health: ReportedHealth,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddResponseResponse {
    pub success: bool,
}

/// Record a step outcome.
///
/// `POST /api/external/add-new-response`
///
/// ```json
/// {
///   "projectName": "my-blog",
///   "key": "bucketPolicy",
///   "health": "FAILED",
///   "message": "Error setting bucket policy"
/// }
/// ```
///
/// `404` for an unknown project or key.
pub async fn add_new_response(
    State(service): State<ProjectService>,
    Json(request): Json<AddResponseRequest>,
) -> AppResult<Json<AddResponseResponse>> {
    service
        .add_response(
            &request.project_name,
            &request.key,
            request.health,
            request.message,
        )
        .await?;
    Ok(Json(AddResponseResponse { success: true }))
}
