//! Project and progress-step models.
//!
//! A project is one requested deployment. Its progress is a fixed, ordered
//! set of steps established at creation; later writes only change the
//! health, message and status code of an existing step.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Health of one progress step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Health {
    NotStarted,
    InProgress,
    Staging,
    Deploying,
    Verifying,
    BuildStarting,
    BuildCloning,
    Building,
    BuildUploading,
    ContainerStarting,
    Success,
    Failed,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::NotStarted => "NOT_STARTED",
            Health::InProgress => "IN_PROGRESS",
            Health::Staging => "STAGING",
            Health::Deploying => "DEPLOYING",
            Health::Verifying => "VERIFYING",
            Health::BuildStarting => "BUILD_STARTING",
            Health::BuildCloning => "BUILD_CLONING",
            Health::Building => "BUILDING",
            Health::BuildUploading => "BUILD_UPLOADING",
            Health::ContainerStarting => "CONTAINER_STARTING",
            Health::Success => "SUCCESS",
            Health::Failed => "FAILED",
        }
    }

    /// SUCCESS and FAILED end a step's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Health::Success | Health::Failed)
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Health {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "NOT_STARTED" => Ok(Health::NotStarted),
            "IN_PROGRESS" => Ok(Health::InProgress),
            "STAGING" => Ok(Health::Staging),
            "DEPLOYING" => Ok(Health::Deploying),
            "VERIFYING" => Ok(Health::Verifying),
            "BUILD_STARTING" => Ok(Health::BuildStarting),
            "BUILD_CLONING" => Ok(Health::BuildCloning),
            "BUILDING" => Ok(Health::Building),
            "BUILD_UPLOADING" => Ok(Health::BuildUploading),
            "CONTAINER_STARTING" => Ok(Health::ContainerStarting),
            "SUCCESS" => Ok(Health::Success),
            "FAILED" => Ok(Health::Failed),
            other => Err(format!("Unknown health: {}", other)),
        }
    }
}

/// Stable identity of a progress step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum StepKey {
    Project,
    Service,
    Domain,
    Job,
    Secrets,
    FetchMinio,
    FetchPostgresql,
    Postgresql,
    Minio,
    BucketCreated,
    BucketPolicy,
}

impl StepKey {
    /// Every key, in ledger order.
    pub const ALL: [StepKey; 11] = [
        StepKey::Project,
        StepKey::Service,
        StepKey::Domain,
        StepKey::Job,
        StepKey::Secrets,
        StepKey::FetchMinio,
        StepKey::FetchPostgresql,
        StepKey::Postgresql,
        StepKey::Minio,
        StepKey::BucketCreated,
        StepKey::BucketPolicy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKey::Project => "project",
            StepKey::Service => "service",
            StepKey::Domain => "domain",
            StepKey::Job => "job",
            StepKey::Secrets => "secrets",
            StepKey::FetchMinio => "fetchMinio",
            StepKey::FetchPostgresql => "fetchPostgresql",
            StepKey::Postgresql => "postgresql",
            StepKey::Minio => "minio",
            StepKey::BucketCreated => "bucketCreated",
            StepKey::BucketPolicy => "bucketPolicy",
        }
    }

    /// Human readable label shown next to the health.
    pub fn label(&self) -> &'static str {
        match self {
            StepKey::Project => "Project creation",
            StepKey::Service => "Combined service",
            StepKey::Domain => "Custom domain",
            StepKey::Job => "MinIO setup job",
            StepKey::Secrets => "Secrets configuration",
            StepKey::FetchMinio => "Fetch MinIO connection details",
            StepKey::FetchPostgresql => "Fetch PostgreSQL connection details",
            StepKey::Postgresql => "PostgreSQL addon",
            StepKey::Minio => "MinIO addon",
            StepKey::BucketCreated => "MinIO bucket creation",
            StepKey::BucketPolicy => "MinIO bucket policy configuration",
        }
    }

    /// Position of the key in the ledger order.
    pub fn position(&self) -> i32 {
        Self::ALL
            .iter()
            .position(|k| k == self)
            .map(|p| p as i32)
            .unwrap_or_default()
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StepKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown step key: {}", s))
    }
}

/// One milestone in a project's provisioning lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStep {
    pub key: StepKey,
    pub step: String,
    pub health: Health,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Upstream HTTP status recorded with a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
}

impl ProgressStep {
    /// A fresh, not yet started step.
    pub fn pending(key: StepKey) -> Self {
        Self {
            key,
            step: key.label().to_string(),
            health: Health::NotStarted,
            message: None,
            status_code: None,
        }
    }

    /// Merge an update into this step.
    pub fn apply(&mut self, update: &StepUpdate) {
        self.health = update.health;
        self.message = update.message.clone();
        self.status_code = update.status_code;
    }
}

/// Partial update of one progress step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    pub health: Health,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_code: Option<i32>,
}

impl StepUpdate {
    pub fn health(health: Health) -> Self {
        Self {
            health,
            message: None,
            status_code: None,
        }
    }

    pub fn failed(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            health: Health::Failed,
            message: Some(message.into()),
            status_code: Some(i32::from(status_code)),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Named detail blob attached to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    ServiceDetails,
    MinioDetails,
    PostgresqlDetails,
    MinioConnectionDetails,
    PostgresqlConnectionDetails,
}

impl DetailField {
    /// Column holding the blob.
    pub fn column(&self) -> &'static str {
        match self {
            DetailField::ServiceDetails => "service_details",
            DetailField::MinioDetails => "minio_details",
            DetailField::PostgresqlDetails => "postgresql_details",
            DetailField::MinioConnectionDetails => "minio_connection_details",
            DetailField::PostgresqlConnectionDetails => "postgresql_connection_details",
        }
    }
}

/// Addon backup with its restore history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Backup {
    pub id: String,
    #[serde(default)]
    pub restores: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Project document as exposed over the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Internal identifier and deployment slug.
    pub project_name: String,
    pub public_project_name: String,
    /// Subdomain label assigned to the service.
    pub project_domain: String,
    pub progress: Vec<ProgressStep>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minio_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgresql_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minio_connection_details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgresql_connection_details: Option<serde_json::Value>,
    #[serde(default)]
    pub backups: Vec<Backup>,
}

impl Project {
    /// Build a freshly created project with every step at NOT_STARTED.
    pub fn new(new: &NewProject) -> Self {
        Self {
            project_name: new.name.clone(),
            public_project_name: new.public_name.clone(),
            project_domain: new.domain.clone(),
            progress: StepKey::ALL.iter().copied().map(ProgressStep::pending).collect(),
            created_at: new.created_at,
            service_details: None,
            minio_details: None,
            postgresql_details: None,
            minio_connection_details: None,
            postgresql_connection_details: None,
            backups: Vec::new(),
        }
    }

    pub fn step(&self, key: StepKey) -> Option<&ProgressStep> {
        self.progress.iter().find(|s| s.key == key)
    }

    pub fn health(&self, key: StepKey) -> Option<Health> {
        self.step(key).map(|s| s.health)
    }

    /// Mutable access to a detail blob.
    pub fn detail_mut(&mut self, field: DetailField) -> &mut Option<serde_json::Value> {
        match field {
            DetailField::ServiceDetails => &mut self.service_details,
            DetailField::MinioDetails => &mut self.minio_details,
            DetailField::PostgresqlDetails => &mut self.postgresql_details,
            DetailField::MinioConnectionDetails => &mut self.minio_connection_details,
            DetailField::PostgresqlConnectionDetails => &mut self.postgresql_connection_details,
        }
    }
}

/// Input for inserting a project.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub public_name: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

impl NewProject {
    pub fn new(name: &str, public_name: &str) -> Self {
        Self {
            name: name.to_string(),
            public_name: public_name.to_string(),
            domain: name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// `launchpad.project` row.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectRow {
    pub name: String,
    pub public_name: String,
    pub domain: String,
    pub service_details: Option<serde_json::Value>,
    pub minio_details: Option<serde_json::Value>,
    pub postgresql_details: Option<serde_json::Value>,
    pub minio_connection_details: Option<serde_json::Value>,
    pub postgresql_connection_details: Option<serde_json::Value>,
    pub backups: sqlx::types::Json<Vec<Backup>>,
    pub created_at: DateTime<Utc>,
}

/// `launchpad.project_step` row.
#[derive(Debug, Clone, FromRow)]
pub struct ProjectStepRow {
    pub project_name: String,
    pub key: String,
    pub step: String,
    pub health: String,
    pub message: Option<String>,
    pub status_code: Option<i32>,
}

impl ProjectStepRow {
    /// Convert to the API model, skipping rows with unknown keys.
    pub fn into_step(self) -> Option<ProgressStep> {
        let key = self.key.parse().ok()?;
        Some(ProgressStep {
            key,
            step: self.step,
            health: self.health.parse().unwrap_or(Health::NotStarted),
            message: self.message,
            status_code: self.status_code,
        })
    }
}

impl ProjectRow {
    pub fn into_project(self, progress: Vec<ProgressStep>) -> Project {
        Project {
            project_name: self.name,
            public_project_name: self.public_name,
            project_domain: self.domain,
            progress,
            created_at: self.created_at,
            service_details: self.service_details,
            minio_details: self.minio_details,
            postgresql_details: self.postgresql_details,
            minio_connection_details: self.minio_connection_details,
            postgresql_connection_details: self.postgresql_connection_details,
            backups: self.backups.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_display() {
        assert_eq!(Health::NotStarted.to_string(), "NOT_STARTED");
        assert_eq!(Health::BuildUploading.to_string(), "BUILD_UPLOADING");
        assert_eq!(
            serde_json::to_value(Health::ContainerStarting).unwrap(),
            serde_json::json!("CONTAINER_STARTING")
        );
    }

    #[test]
    fn test_health_from_str() {
        assert_eq!("success".parse::<Health>().unwrap(), Health::Success);
        assert_eq!("FAILED".parse::<Health>().unwrap(), Health::Failed);
        assert!("DONE".parse::<Health>().is_err());
    }

    #[test]
    fn test_health_lifecycle() {
        assert!(Health::Success.is_terminal());
        assert!(Health::Failed.is_terminal());
        assert!(!Health::Verifying.is_terminal());
    }

    #[test]
    fn test_step_key_names() {
        assert_eq!(StepKey::FetchMinio.as_str(), "fetchMinio");
        assert_eq!(
            serde_json::to_value(StepKey::BucketPolicy).unwrap(),
            serde_json::json!("bucketPolicy")
        );
        assert_eq!("postgresql".parse::<StepKey>().unwrap(), StepKey::Postgresql);
        assert!("Postgresql".parse::<StepKey>().is_err());
    }

    #[test]
    fn test_new_project_has_fixed_progress() {
        let project = Project::new(&NewProject::new("my-blog", "My Blog!"));
        let keys: Vec<_> = project.progress.iter().map(|s| s.key).collect();
        assert_eq!(keys, StepKey::ALL.to_vec());
        assert!(project
            .progress
            .iter()
            .all(|s| s.health == Health::NotStarted));
        assert_eq!(project.project_domain, "my-blog");
    }

    #[test]
    fn test_step_update_apply() {
        let mut step = ProgressStep::pending(StepKey::Minio);
        step.apply(&StepUpdate::failed(429, "Too many requests"));
        assert_eq!(step.health, Health::Failed);
        assert_eq!(step.status_code, Some(429));
        assert_eq!(step.message.as_deref(), Some("Too many requests"));

        step.apply(&StepUpdate::health(Health::Staging));
        assert_eq!(step.message, None);
        assert_eq!(step.status_code, None);
    }

    #[test]
    fn test_project_serializes_camel_case() {
        let project = Project::new(&NewProject::new("my-blog", "My Blog!"));
        let json = serde_json::to_value(&project).unwrap();
        assert_eq!(json["projectName"], "my-blog");
        assert_eq!(json["publicProjectName"], "My Blog!");
        assert_eq!(json["progress"][5]["key"], "fetchMinio");
        assert!(json.get("serviceDetails").is_none());
    }

    fn step_row(key: &str, health: &str) -> ProjectStepRow {
        ProjectStepRow {
            project_name: "shop".to_string(),
            key: key.to_string(),
            step: "Minio addon".to_string(),
            health: health.to_string(),
            message: Some("Too many requests".to_string()),
            status_code: Some(429),
        }
    }

    #[test]
    fn test_step_row_into_step() {
        let step = step_row("minio", "FAILED").into_step().unwrap();
        assert_eq!(step.key, StepKey::Minio);
        assert_eq!(step.health, Health::Failed);
        assert_eq!(step.status_code, Some(429));
        assert_eq!(step.message.as_deref(), Some("Too many requests"));

        // Unknown health falls back, unknown keys are dropped.
        let step = step_row("minio", "PAUSED").into_step().unwrap();
        assert_eq!(step.health, Health::NotStarted);
        assert!(step_row("bucket", "SUCCESS").into_step().is_none());
    }

    #[test]
    fn test_project_row_into_project() {
        let created_at = Utc::now();
        let row = ProjectRow {
            name: "shop".to_string(),
            public_name: "Shop".to_string(),
            domain: "shop".to_string(),
            service_details: Some(serde_json::json!({ "id": "strapi" })),
            minio_details: None,
            postgresql_details: None,
            minio_connection_details: Some(serde_json::json!({ "host": "minio.internal" })),
            postgresql_connection_details: None,
            backups: sqlx::types::Json(vec![]),
            created_at,
        };
        let progress: Vec<_> = StepKey::ALL
            .iter()
            .map(|k| ProgressStep::pending(*k))
            .collect();

        let project = row.into_project(progress);
        assert_eq!(project.project_name, "shop");
        assert_eq!(project.public_project_name, "Shop");
        assert_eq!(project.project_domain, "shop");
        assert_eq!(project.created_at, created_at);
        assert_eq!(project.progress.len(), 11);
        assert_eq!(project.service_details, Some(serde_json::json!({ "id": "strapi" })));
        assert!(project.minio_connection_details.is_some());
        assert!(project.backups.is_empty());
    }
}
