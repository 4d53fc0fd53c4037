//! HTTP handlers for the launchpad control plane API.
//!
//! Route handlers organized by area, plus the route table that ties each
//! group to its service.

pub mod deploy;
pub mod external;
pub mod fetch;
pub mod health;

pub use health::{api_health, health_check};

use axum::{
    routing::{get, post},
    Router,
};

use crate::services::{BackupService, ProjectService};
use crate::state::AppState;

/// Every route of the API, without middleware.
pub fn routes(state: AppState, projects: ProjectService, backups: BackupService) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(api_health))
        .with_state(state);

    let deploy_routes = Router::new()
        .route(
            "/api/deploy/create-deployment",
            post(deploy::create_deployment),
        )
        .with_state(projects.clone());

    let backup_routes = Router::new()
        .route("/api/deploy/backup-addon", post(deploy::backup_addon))
        .route(
            "/api/deploy/restore-addon-backup",
            post(deploy::restore_addon_backup),
        )
        .route(
            "/api/deploy/delete-addon-backup",
            post(deploy::delete_addon_backup),
        )
        .with_state(backups);

    let fetch_routes = Router::new()
        .route("/api/fetch/project", post(fetch::project))
        .route("/api/fetch/projects", post(fetch::projects))
        .route("/api/fetch/refresh-projects", post(fetch::refresh_projects))
        .route(
            "/api/external/add-new-response",
            post(external::add_new_response),
        )
        .with_state(projects);

    Router::new()
        .merge(health_routes)
        .merge(deploy_routes)
        .merge(backup_routes)
        .merge(fetch_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::engine::{OrchestratorTiming, ProvisioningOrchestrator};
    use crate::provider::UpstreamError;
    use crate::testing::{context, FakeApi, FakeDns};

    fn app(api: Arc<FakeApi>) -> Router {
        let ctx = context(api.clone(), Arc::new(FakeDns::default()));
        let state = AppState::new(ctx.ledger.clone(), AppConfig::default());
        let orchestrator = ProvisioningOrchestrator::new(ctx, OrchestratorTiming::default());
        let projects = ProjectService::new(orchestrator, Duration::from_secs(3600));
        routes(state, projects, BackupService::new(api))
    }

    async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_create_deployment_accepted() {
        let app = app(Arc::new(FakeApi::default()));
        let (status, body) = post_json(
            &app,
            "/api/deploy/create-deployment",
            json!({ "publicProjectName": "My Blog!" }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({ "success": true, "slug": "my-blog" }));

        let (_, body) = post_json(
            &app,
            "/api/deploy/create-deployment",
            json!({ "publicProjectName": "My Blog!" }),
        )
        .await;
        assert_eq!(body["slug"], "my-blog1");
    }

    #[tokio::test]
    async fn test_create_deployment_invalid_name() {
        let app = app(Arc::new(FakeApi::default()));
        let (status, body) = post_json(
            &app,
            "/api/deploy/create-deployment",
            json!({ "publicProjectName": "***" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], 422);

        let (_, projects) = post_json(&app, "/api/fetch/projects", json!({})).await;
        assert_eq!(projects, json!([]));
    }

    #[tokio::test]
    async fn test_fetch_project_statuses() {
        let app = app(Arc::new(FakeApi::default()));
        let (status, _) = post_json(
            &app,
            "/api/fetch/project",
            json!({ "projectName": "[slug]" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = post_json(
            &app,
            "/api/fetch/project",
            json!({ "projectName": "ghost" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        post_json(
            &app,
            "/api/deploy/create-deployment",
            json!({ "publicProjectName": "Shop" }),
        )
        .await;
        let (status, body) = post_json(
            &app,
            "/api/fetch/project",
            json!({ "projectName": "shop" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projectName"], "shop");
        assert_eq!(body["publicProjectName"], "Shop");
        assert_eq!(body["progress"].as_array().unwrap().len(), 11);
    }

    #[tokio::test]
    async fn test_add_new_response() {
        let app = app(Arc::new(FakeApi::default()));
        post_json(
            &app,
            "/api/deploy/create-deployment",
            json!({ "publicProjectName": "Shop" }),
        )
        .await;

        let (status, body) = post_json(
            &app,
            "/api/external/add-new-response",
            json!({
                "projectName": "shop",
                "key": "bucketCreated",
                "health": "SUCCESS",
                "message": "Bucket created"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (status, _) = post_json(
            &app,
            "/api/external/add-new-response",
            json!({ "projectName": "shop", "key": "nope", "health": "SUCCESS" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, projects) = post_json(&app, "/api/fetch/projects", json!({})).await;
        let step = projects[0]["progress"]
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["key"] == "bucketCreated")
            .cloned()
            .unwrap();
        assert_eq!(step["health"], "SUCCESS");
        assert_eq!(step["message"], "Bucket created");
    }

    #[tokio::test]
    async fn test_backup_failure_body() {
        let api = Arc::new(FakeApi::default());
        api.fail("restore_addon_backup", UpstreamError::new(404, "No such backup"));
        let app = app(api);

        let (status, body) = post_json(
            &app,
            "/api/deploy/restore-addon-backup",
            json!({ "projectName": "shop", "addonId": "postgresql", "backupId": "b-9" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], true);
        assert_eq!(body["code"], 404);
    }

    #[tokio::test]
    async fn test_health_routes() {
        let app = app(Arc::new(FakeApi::default()));
        let request = Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
