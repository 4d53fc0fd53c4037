//! Fixed shape of a deployment: resource ids, plans and request payloads.

use serde_json::{json, Value};

use crate::db::models::{DetailField, StepKey};

pub const DEFAULT_REGION: &str = "europe-west";
pub const SERVICE_PLAN: &str = "nf-compute-200";
pub const BASIC_PLAN: &str = "nf-compute-20";

pub const SERVICE_ID: &str = "strapi";
pub const SETUP_JOB_ID: &str = "minio-setup-control";

pub const MINIO_VERSION: &str = "2021.6.17";
pub const POSTGRESQL_VERSION: &str = "13.4.0";
const ADDON_STORAGE_MB: u32 = 4096;

pub const BUCKET: &str = "media";
const BUCKET_FOLDER: &str = "uploads";

/// One of the two managed data addons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddonKind {
    Minio,
    Postgresql,
}

impl AddonKind {
    /// Remote addon id.
    pub fn id(&self) -> &'static str {
        match self {
            AddonKind::Minio => "minio",
            AddonKind::Postgresql => "postgresql",
        }
    }

    /// Ledger key tracking the addon itself.
    pub fn step_key(&self) -> StepKey {
        match self {
            AddonKind::Minio => StepKey::Minio,
            AddonKind::Postgresql => StepKey::Postgresql,
        }
    }

    /// Ledger key tracking the credential fetch.
    pub fn fetch_key(&self) -> StepKey {
        match self {
            AddonKind::Minio => StepKey::FetchMinio,
            AddonKind::Postgresql => StepKey::FetchPostgresql,
        }
    }

    pub fn details_field(&self) -> DetailField {
        match self {
            AddonKind::Minio => DetailField::MinioDetails,
            AddonKind::Postgresql => DetailField::PostgresqlDetails,
        }
    }

    pub fn connection_field(&self) -> DetailField {
        match self {
            AddonKind::Minio => DetailField::MinioConnectionDetails,
            AddonKind::Postgresql => DetailField::PostgresqlConnectionDetails,
        }
    }
}

/// Builds the request payloads of one deployment.
#[derive(Debug, Clone)]
pub struct Blueprint {
    /// Apex domain under which project subdomains are created.
    pub domain_name: String,
    /// Public URL the setup job reports back to.
    pub app_url: String,
    pub region: String,
}

impl Blueprint {
    pub fn new(domain_name: impl Into<String>, app_url: impl Into<String>) -> Self {
        Self {
            domain_name: domain_name.into(),
            app_url: app_url.into(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn project(&self, project_name: &str) -> Value {
        json!({
            "name": project_name,
            "region": self.region,
            "description": "Strapi running on Northflank with PostgreSQL and MinIO",
        })
    }

    pub fn combined_service(&self) -> Value {
        json!({
            "name": "Strapi",
            "description": "Strapi combined service",
            "billing": { "deploymentPlan": SERVICE_PLAN },
            "deployment": { "instances": 1 },
            "ports": [
                { "name": "p1", "internalPort": 1337, "public": true, "protocol": "HTTP" }
            ],
            "vcsData": {
                "projectUrl": "https://github.com/northflank/strapi-on-northflank",
                "projectType": "github",
                "projectBranch": "master",
            },
            "buildSettings": {
                "dockerfile": {
                    "buildEngine": "kaniko",
                    "dockerFilePath": "/Dockerfile-v14-alpine",
                    "dockerWorkDir": "/",
                }
            },
        })
    }

    pub fn setup_job(&self, project_name: &str) -> Value {
        json!({
            "name": SETUP_JOB_ID,
            "description": "MinIO Setup Control",
            "billing": { "deploymentPlan": BASIC_PLAN },
            "backoffLimit": 0,
            "activeDeadlineSeconds": 600,
            "deployment": {
                "vcs": {
                    "projectUrl": "https://github.com/northflank/minio-setup-control",
                    "projectType": "github",
                    "projectBranch": "master",
                }
            },
            "buildSettings": {
                "dockerfile": {
                    "buildEngine": "kaniko",
                    "dockerFilePath": "/Dockerfile",
                    "dockerWorkDir": "/",
                }
            },
            "environment": {
                "PROJECT_NAME": project_name,
                "RESPONSE_ENDPOINT": self.app_url,
            },
        })
    }

    pub fn addon(&self, kind: AddonKind) -> Value {
        match kind {
            AddonKind::Minio => json!({
                "name": "MinIO",
                "description": "MinIO Strapi Storage",
                "type": "minio",
                "version": MINIO_VERSION,
                "tlsEnabled": true,
                "externalAccessEnabled": true,
                "billing": {
                    "deploymentPlan": BASIC_PLAN,
                    "storage": ADDON_STORAGE_MB,
                    "replicas": 1,
                },
            }),
            AddonKind::Postgresql => json!({
                "name": "PostgreSQL",
                "description": "PostgreSQL Strapi Database",
                "type": "postgres",
                "version": POSTGRESQL_VERSION,
                "tlsEnabled": true,
                "billing": {
                    "deploymentPlan": BASIC_PLAN,
                    "storage": ADDON_STORAGE_MB,
                    "replicas": 1,
                },
            }),
        }
    }

    /// Secret group exposing both addons to the service.
    pub fn secret_group(&self, minio_id: &str, postgresql_id: &str) -> Value {
        fn alias(key: &str, alias: &str) -> Value {
            json!({ "keyName": key, "aliases": [alias] })
        }

        json!({
            "name": "Strapi",
            "description": "Secret group for Strapi",
            "secretType": "environment",
            "priority": 10,
            "restrictions": { "restricted": false },
            "addonDependencies": [
                {
                    "addonId": minio_id,
                    "keys": [
                        alias("MINIO_EXTERNAL_ENDPOINT", "MINIO_ENDPOINT"),
                        alias("host", "MINIO_HOST"),
                        alias("accessKey", "MINIO_ACCESS_KEY"),
                        alias("secretKey", "MINIO_SECRET_KEY"),
                        alias("tlsEnabled", "MINIO_SSL"),
                    ],
                },
                {
                    "addonId": postgresql_id,
                    "keys": [
                        alias("host", "DATABASE_HOST"),
                        alias("port", "DATABASE_PORT"),
                        alias("username", "DATABASE_USERNAME"),
                        alias("password", "DATABASE_PASSWORD"),
                        alias("database", "DATABASE_NAME"),
                    ],
                },
            ],
            "data": {
                "MINIO_BUCKET": BUCKET,
                "MINIO_FOLDER": BUCKET_FOLDER,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addon_keys() {
        assert_eq!(AddonKind::Minio.step_key(), StepKey::Minio);
        assert_eq!(AddonKind::Postgresql.fetch_key(), StepKey::FetchPostgresql);
        assert_eq!(
            AddonKind::Minio.connection_field(),
            DetailField::MinioConnectionDetails
        );
    }

    #[test]
    fn test_setup_job_reports_back() {
        let blueprint = Blueprint::new("strapi.run", "https://launchpad.example");
        let job = blueprint.setup_job("my-blog");
        assert_eq!(job["environment"]["PROJECT_NAME"], "my-blog");
        assert_eq!(
            job["environment"]["RESPONSE_ENDPOINT"],
            "https://launchpad.example"
        );
        assert_eq!(job["backoffLimit"], 0);
    }

    #[test]
    fn test_secret_group_binds_both_addons() {
        let blueprint = Blueprint::new("strapi.run", "http://localhost");
        let group = blueprint.secret_group("minio", "postgresql");
        let deps = group["addonDependencies"].as_array().unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0]["addonId"], "minio");
        assert_eq!(deps[1]["keys"][0]["aliases"][0], "DATABASE_HOST");
        assert_eq!(group["data"]["MINIO_BUCKET"], "media");
    }
}
