//! PostgreSQL ledger.

use async_trait::async_trait;

use super::{LedgerError, LedgerResult, ProgressLedger};
use crate::db::models::{Backup, DetailField, NewProject, Project, StepKey, StepUpdate};
use crate::db::queries::project as queries;
use crate::db::{pool, DbPool};

/// Ledger stored in `launchpad.project` and `launchpad.project_step`.
#[derive(Clone)]
pub struct PgLedger {
    pool: DbPool,
}

impl PgLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProgressLedger for PgLedger {
    async fn insert_project(&self, project: &NewProject) -> LedgerResult<()> {
        if queries::insert_project(&self.pool, project).await? {
            Ok(())
        } else {
            Err(LedgerError::NameConflict(project.name.clone()))
        }
    }

    async fn record_step(
        &self,
        project_name: &str,
        key: StepKey,
        update: &StepUpdate,
    ) -> LedgerResult<()> {
        let rows = queries::update_step(&self.pool, project_name, key, update).await?;
        if rows == 0 {
            if queries::get_project(&self.pool, project_name).await?.is_none() {
                return Err(LedgerError::ProjectNotFound(project_name.to_string()));
            }
            return Err(LedgerError::StepNotFound {
                project: project_name.to_string(),
                key,
            });
        }
        Ok(())
    }

    async fn attach_detail(
        &self,
        project_name: &str,
        field: DetailField,
        value: serde_json::Value,
    ) -> LedgerResult<()> {
        let rows = queries::update_detail(&self.pool, project_name, field, &value).await?;
        if rows == 0 {
            return Err(LedgerError::ProjectNotFound(project_name.to_string()));
        }
        Ok(())
    }

    async fn get_project(&self, project_name: &str) -> LedgerResult<Project> {
        queries::get_project(&self.pool, project_name)
            .await?
            .ok_or_else(|| LedgerError::ProjectNotFound(project_name.to_string()))
    }

    async fn list_projects(&self) -> LedgerResult<Vec<Project>> {
        Ok(queries::list_projects(&self.pool).await?)
    }

    async fn set_backups(&self, project_name: &str, mut backups: Vec<Backup>) -> LedgerResult<()> {
        backups.reverse();
        let rows = queries::update_backups(&self.pool, project_name, &backups).await?;
        if rows == 0 {
            return Err(LedgerError::ProjectNotFound(project_name.to_string()));
        }
        Ok(())
    }

    async fn set_backup_restores(
        &self,
        project_name: &str,
        backup_id: &str,
        mut restores: Vec<serde_json::Value>,
    ) -> LedgerResult<()> {
        restores.reverse();
        let rows =
            queries::update_backup_restores(&self.pool, project_name, backup_id, &restores).await?;
        if rows == 0 {
            return Err(LedgerError::ProjectNotFound(project_name.to_string()));
        }
        Ok(())
    }

    async fn ping(&self) -> bool {
        pool::ping(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::db::ensure_schema;
    use crate::db::models::Health;

    /// Ledger on `LAUNCHPAD_TEST_DATABASE_URL`, or `None` when it is unset.
    async fn ledger() -> Option<PgLedger> {
        let url = std::env::var("LAUNCHPAD_TEST_DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        ensure_schema(&pool).await.unwrap();
        Some(PgLedger::new(pool))
    }

    #[tokio::test]
    async fn test_pg_ledger_round_trip() {
        let Some(ledger) = ledger().await else {
            return;
        };
        let public_name = format!("Ledger Test {}", chrono::Utc::now().timestamp_micros());
        let name = ledger.create_project(&public_name).await.unwrap();

        ledger
            .record_step(&name, StepKey::Minio, &StepUpdate::failed(429, "Too many requests"))
            .await
            .unwrap();
        let project = ledger.get_project(&name).await.unwrap();
        let keys: Vec<_> = project.progress.iter().map(|s| s.key).collect();
        assert_eq!(keys, StepKey::ALL.to_vec());
        let minio = project.step(StepKey::Minio).unwrap();
        assert_eq!(minio.health, Health::Failed);
        assert_eq!(minio.status_code, Some(429));

        let err = ledger
            .record_step("no-such-project", StepKey::Minio, &StepUpdate::health(Health::Success))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ProjectNotFound(_)));

        assert!(ledger
            .list_projects()
            .await
            .unwrap()
            .iter()
            .any(|p| p.project_name == name));

        sqlx::query("DELETE FROM launchpad.project WHERE name = $1")
            .bind(&name)
            .execute(&ledger.pool)
            .await
            .unwrap();
    }
}
