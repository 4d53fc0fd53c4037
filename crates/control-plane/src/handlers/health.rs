//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// "ok" or "unhealthy"
    pub status: String,
}

/// Detailed health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealthResponse {
    pub status: String,

    /// Ledger connectivity status
    pub ledger: String,

    pub server_name: String,

    pub uptime_seconds: u64,

    pub version: String,
}

/// Basic health check endpoint.
///
/// `GET /health`
///
/// Answers without touching the ledger, for load balancer checks.
pub async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Detailed API health check endpoint.
///
/// `GET /api/health`
///
/// # Returns
///
/// - `200 OK` when the ledger answers
/// - `503 Service Unavailable` otherwise
///
/// ```json
/// {
///   "status": "ok",
///   "ledger": "connected",
///   "server_name": "launchpad-control-plane",
///   "uptime_seconds": 42,
///   "version": "0.1.0"
/// }
/// ```
pub async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<ApiHealthResponse>) {
    let ledger_healthy = state.ledger.ping().await;

    let (status_code, status, ledger) = if ledger_healthy {
        (StatusCode::OK, "ok", "connected")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy", "disconnected")
    };

    let response = ApiHealthResponse {
        status: status.to_string(),
        ledger: ledger.to_string(),
        server_name: state.config.server_name.clone(),
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::ledger::MemoryLedger;

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_api_health_reports_ledger() {
        let state = AppState::new(Arc::new(MemoryLedger::new()), AppConfig::default());
        let (status, Json(body)) = api_health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.ledger, "connected");
        assert_eq!(body.server_name, "launchpad-control-plane");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
