//! Project read API handlers.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::db::models::Project;
use crate::error::AppResult;
use crate::result_ext::ResultExt;
use crate::services::ProjectService;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchProjectRequest {
    pub project_name: String,
}

/// Refresh one project from the platform and return it.
///
/// `POST /api/fetch/project`
///
/// ```json
/// { "projectName": "my-blog" }
/// ```
///
/// - `400` when the project does not exist
/// - `404` for the placeholders `[slug]` and `undefined`
pub async fn project(
    State(service): State<ProjectService>,
    Json(request): Json<FetchProjectRequest>,
) -> AppResult<Json<Project>> {
    let project = service.fetch(&request.project_name).await?;
    Ok(Json(project))
}

/// List every project, most recent first.
///
/// `POST /api/fetch/projects`
pub async fn projects(State(service): State<ProjectService>) -> AppResult<Json<Vec<Project>>> {
    Ok(Json(service.list().await?))
}

/// Start a background refresh of every project and return the current list.
///
/// `POST /api/fetch/refresh-projects`
pub async fn refresh_projects(
    State(service): State<ProjectService>,
) -> AppResult<Json<Vec<Project>>> {
    let background = service.clone();
    tokio::spawn(async move {
        let _ = background.refresh_all().await.log("refresh all projects");
    });
    Ok(Json(service.list().await?))
}
