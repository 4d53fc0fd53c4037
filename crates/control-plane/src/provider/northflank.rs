//! REST client for the Northflank v1 API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    ApiResult, BuildInfo, ContainerInfo, ProvisioningApi, ServicePort, SubdomainAssignment,
    SubdomainRecord, UpstreamError,
};
use crate::config::ProviderConfig;
use crate::db::models::Backup;

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Ports {
    #[serde(default)]
    ports: Vec<ServicePort>,
}

#[derive(Deserialize)]
struct Builds {
    #[serde(default)]
    builds: Vec<BuildInfo>,
}

#[derive(Deserialize)]
struct Pods {
    #[serde(default)]
    pods: Vec<ContainerInfo>,
}

#[derive(Deserialize)]
struct Backups {
    #[serde(default)]
    backups: Vec<Backup>,
}

/// HTTP client for the provisioning platform.
#[derive(Clone)]
pub struct NorthflankClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl NorthflankClient {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ApiResult<T> {
        let url = format!("{}/v1{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| UpstreamError::transport(e.to_string()))?;

        tracing::debug!(%method, path, status = status.as_u16(), "Provisioning API call");

        let envelope: Envelope = if text.trim().is_empty() {
            Envelope {
                data: None,
                error: None,
            }
        } else {
            serde_json::from_str(&text).map_err(|e| {
                UpstreamError::new(status.as_u16(), format!("Malformed response: {}", e))
            })?
        };

        if let Some(error) = envelope.error {
            return Err(UpstreamError::new(
                error.status.unwrap_or(status.as_u16()),
                error
                    .message
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
            ));
        }
        if !status.is_success() {
            return Err(UpstreamError::new(
                status.as_u16(),
                status.canonical_reason().unwrap_or("error"),
            ));
        }

        serde_json::from_value(envelope.data.unwrap_or(Value::Null)).map_err(|e| {
            UpstreamError::new(status.as_u16(), format!("Malformed response: {}", e))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> ApiResult<T> {
        self.request(Method::POST, path, Some(body)).await
    }
}

#[async_trait]
impl ProvisioningApi for NorthflankClient {
    async fn create_project(&self, payload: &Value) -> ApiResult<Value> {
        self.post("/projects", payload).await
    }

    async fn create_combined_service(&self, project: &str, payload: &Value) -> ApiResult<Value> {
        self.post(&format!("/projects/{}/services/combined", project), payload)
            .await
    }

    async fn create_manual_job(&self, project: &str, payload: &Value) -> ApiResult<Value> {
        self.post(&format!("/projects/{}/jobs/manual", project), payload)
            .await
    }

    async fn create_addon(&self, project: &str, payload: &Value) -> ApiResult<Value> {
        self.post(&format!("/projects/{}/addons", project), payload)
            .await
    }

    async fn create_secret_group(&self, project: &str, payload: &Value) -> ApiResult<Value> {
        self.post(&format!("/projects/{}/secrets", project), payload)
            .await
    }

    async fn add_subdomain(&self, domain: &str, subdomain: &str) -> ApiResult<SubdomainRecord> {
        self.post(
            &format!("/domains/{}/subdomains", domain),
            &json!({ "subdomain": subdomain }),
        )
        .await
    }

    async fn verify_subdomain(&self, domain: &str, subdomain: &str) -> ApiResult<Value> {
        self.post(
            &format!("/domains/{}/subdomains/{}/verify", domain, subdomain),
            &json!({}),
        )
        .await
    }

    async fn assign_subdomain(
        &self,
        domain: &str,
        subdomain: &str,
        assignment: &SubdomainAssignment,
    ) -> ApiResult<Value> {
        let body = serde_json::to_value(assignment)
            .map_err(|e| UpstreamError::new(400, e.to_string()))?;
        self.post(
            &format!("/domains/{}/subdomains/{}/assign", domain, subdomain),
            &body,
        )
        .await
    }

    async fn get_service_ports(&self, project: &str, service: &str) -> ApiResult<Vec<ServicePort>> {
        let ports: Ports = self
            .get(&format!("/projects/{}/services/{}/ports", project, service))
            .await?;
        Ok(ports.ports)
    }

    async fn get_service_builds(&self, project: &str, service: &str) -> ApiResult<Vec<BuildInfo>> {
        let builds: Builds = self
            .get(&format!("/projects/{}/services/{}/build", project, service))
            .await?;
        Ok(builds.builds)
    }

    async fn get_service_containers(
        &self,
        project: &str,
        service: &str,
    ) -> ApiResult<Vec<ContainerInfo>> {
        let pods: Pods = self
            .get(&format!("/projects/{}/services/{}/containers", project, service))
            .await?;
        Ok(pods.pods)
    }

    async fn get_service_details(&self, project: &str, service: &str) -> ApiResult<Value> {
        self.get(&format!("/projects/{}/services/{}", project, service))
            .await
    }

    async fn get_job_builds(&self, project: &str, job: &str) -> ApiResult<Vec<BuildInfo>> {
        let builds: Builds = self
            .get(&format!("/projects/{}/jobs/{}/build", project, job))
            .await?;
        Ok(builds.builds)
    }

    async fn start_job_run(&self, project: &str, job: &str) -> ApiResult<Value> {
        self.post(&format!("/projects/{}/jobs/{}/runs", project, job), &json!({}))
            .await
    }

    async fn get_addon_details(&self, project: &str, addon: &str) -> ApiResult<Value> {
        self.get(&format!("/projects/{}/addons/{}", project, addon))
            .await
    }

    async fn get_addon_credentials(&self, project: &str, addon: &str) -> ApiResult<Value> {
        self.get(&format!("/projects/{}/addons/{}/credentials", project, addon))
            .await
    }

    async fn backup_addon(&self, project: &str, addon: &str, name: &str) -> ApiResult<Value> {
        self.post(
            &format!("/projects/{}/addons/{}/backups", project, addon),
            &json!({ "name": name }),
        )
        .await
    }

    async fn list_addon_backups(&self, project: &str, addon: &str) -> ApiResult<Vec<Backup>> {
        let backups: Backups = self
            .get(&format!("/projects/{}/addons/{}/backups", project, addon))
            .await?;
        Ok(backups.backups)
    }

    async fn get_addon_backup(
        &self,
        project: &str,
        addon: &str,
        backup: &str,
    ) -> ApiResult<Value> {
        self.get(&format!(
            "/projects/{}/addons/{}/backups/{}",
            project, addon, backup
        ))
        .await
    }

    async fn restore_addon_backup(
        &self,
        project: &str,
        addon: &str,
        backup: &str,
    ) -> ApiResult<Value> {
        self.post(
            &format!("/projects/{}/addons/{}/backups/{}/restore", project, addon, backup),
            &json!({}),
        )
        .await
    }

    async fn delete_addon_backup(
        &self,
        project: &str,
        addon: &str,
        backup: &str,
    ) -> ApiResult<Value> {
        self.request(
            Method::DELETE,
            &format!("/projects/{}/addons/{}/backups/{}", project, addon, backup),
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::Router;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> NorthflankClient {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });
        client(format!("http://{}", addr))
    }

    fn client(base_url: String) -> NorthflankClient {
        let config = ProviderConfig {
            token: "nf-token".to_string(),
            base_url,
            ..ProviderConfig::default()
        };
        NorthflankClient::new(&config, Duration::from_secs(5))
    }

    fn reply(status: StatusCode, body: &'static str) -> (StatusCode, &'static str) {
        (status, body)
    }

    #[tokio::test]
    async fn test_data_envelope_is_unwrapped() {
        let router = Router::new()
            .route(
                "/v1/projects/shop/services/strapi",
                get(|headers: HeaderMap| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer nf-token");
                    if authorized {
                        reply(StatusCode::OK, r#"{"data":{"id":"strapi","name":"Strapi"}}"#)
                    } else {
                        reply(StatusCode::UNAUTHORIZED, "")
                    }
                }),
            )
            .route(
                "/v1/projects/shop/services/strapi/ports",
                get(|| async {
                    reply(StatusCode::OK, r#"{"data":{"ports":[{"name":"p1","internalPort":1337}]}}"#)
                }),
            );
        let api = serve(router).await;

        let details = api.get_service_details("shop", "strapi").await.unwrap();
        assert_eq!(details, json!({ "id": "strapi", "name": "Strapi" }));

        let ports = api.get_service_ports("shop", "strapi").await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].name, "p1");
        assert_eq!(ports[0].extra["internalPort"], 1337);
    }

    #[tokio::test]
    async fn test_error_body_status_takes_precedence() {
        let router = Router::new()
            .route(
                "/v1/projects",
                post(|| async {
                    reply(
                        StatusCode::BAD_REQUEST,
                        r#"{"error":{"status":409,"message":"Project exists"}}"#,
                    )
                }),
            )
            .route(
                "/v1/projects/shop/addons",
                post(|| async {
                    reply(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        r#"{"error":{"message":"Invalid plan"}}"#,
                    )
                }),
            );
        let api = serve(router).await;

        let err = api.create_project(&json!({ "name": "shop" })).await.unwrap_err();
        assert_eq!(err, UpstreamError::new(409, "Project exists"));

        let err = api
            .create_addon("shop", &json!({ "name": "MinIO" }))
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::new(422, "Invalid plan"));
    }

    #[tokio::test]
    async fn test_non_success_without_envelope() {
        let router = Router::new()
            .route(
                "/v1/projects/shop/addons/minio",
                get(|| async { reply(StatusCode::SERVICE_UNAVAILABLE, "") }),
            )
            .route(
                "/v1/projects/shop/addons/postgresql",
                get(|| async { reply(StatusCode::BAD_GATEWAY, "{}") }),
            );
        let api = serve(router).await;

        let err = api.get_addon_details("shop", "minio").await.unwrap_err();
        assert_eq!(err, UpstreamError::new(503, "Service Unavailable"));
        assert!(err.is_transient());

        let err = api.get_addon_details("shop", "postgresql").await.unwrap_err();
        assert_eq!(err, UpstreamError::new(502, "Bad Gateway"));
    }

    #[tokio::test]
    async fn test_malformed_or_empty_body() {
        let router = Router::new()
            .route(
                "/v1/projects/shop/addons/minio",
                get(|| async { reply(StatusCode::OK, "<html>maintenance</html>") }),
            )
            .route(
                "/v1/projects/shop/services/strapi/ports",
                get(|| async { reply(StatusCode::OK, "") }),
            );
        let api = serve(router).await;

        let err = api.get_addon_details("shop", "minio").await.unwrap_err();
        assert_eq!(err.status, 200);
        assert!(err.message.starts_with("Malformed response"));

        // An empty body carries no data to decode the port list from.
        let err = api.get_service_ports("shop", "strapi").await.unwrap_err();
        assert_eq!(err.status, 200);
        assert!(err.message.starts_with("Malformed response"));
    }

    #[tokio::test]
    async fn test_transport_error_has_status_zero() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(format!("http://{}", addr));
        let err = api.get_addon_details("shop", "minio").await.unwrap_err();
        assert_eq!(err.status, 0);
        assert!(err.is_transient());
    }
}
