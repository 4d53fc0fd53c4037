//! Project ledger queries.

use std::collections::HashMap;

use sqlx::types::Json;

use crate::db::models::{
    Backup, DetailField, NewProject, ProgressStep, Project, ProjectRow, ProjectStepRow, StepKey,
    StepUpdate,
};
use crate::db::DbPool;

const PROJECT_COLUMNS: &str = r#"
    name, public_name, domain,
    service_details, minio_details, postgresql_details,
    minio_connection_details, postgresql_connection_details,
    backups, created_at
"#;

/// Insert a project and all of its progress steps.
///
/// Returns `false` without writing anything when the name is already taken.
pub async fn insert_project(pool: &DbPool, project: &NewProject) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO launchpad.project (name, public_name, domain, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(&project.name)
    .bind(&project.public_name)
    .bind(&project.domain)
    .bind(project.created_at)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if inserted == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    for key in StepKey::ALL {
        sqlx::query(
            r#"
            INSERT INTO launchpad.project_step (project_name, key, position, step, health)
            VALUES ($1, $2, $3, $4, 'NOT_STARTED')
            "#,
        )
        .bind(&project.name)
        .bind(key.as_str())
        .bind(key.position())
        .bind(key.label())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Update one progress step. Returns the number of rows touched (0 or 1).
pub async fn update_step(
    pool: &DbPool,
    project_name: &str,
    key: StepKey,
    update: &StepUpdate,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE launchpad.project_step
        SET health = $3, message = $4, status_code = $5, updated_at = now()
        WHERE project_name = $1 AND key = $2
        "#,
    )
    .bind(project_name)
    .bind(key.as_str())
    .bind(update.health.as_str())
    .bind(&update.message)
    .bind(update.status_code)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Replace one detail blob of a project.
pub async fn update_detail(
    pool: &DbPool,
    project_name: &str,
    field: DetailField,
    value: &serde_json::Value,
) -> Result<u64, sqlx::Error> {
    // Column names come from a closed enum, never from input.
    let sql = format!(
        "UPDATE launchpad.project SET {} = $2 WHERE name = $1",
        field.column()
    );
    let result = sqlx::query(&sql)
        .bind(project_name)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Replace the backup list of a project.
pub async fn update_backups(
    pool: &DbPool,
    project_name: &str,
    backups: &[Backup],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE launchpad.project SET backups = $2 WHERE name = $1")
        .bind(project_name)
        .bind(Json(backups))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

/// Replace the restore history of one backup in place.
pub async fn update_backup_restores(
    pool: &DbPool,
    project_name: &str,
    backup_id: &str,
    restores: &[serde_json::Value],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE launchpad.project
        SET backups = (
            SELECT COALESCE(
                jsonb_agg(
                    CASE WHEN b->>'id' = $2 THEN jsonb_set(b, '{restores}', $3) ELSE b END
                    ORDER BY ord
                ),
                '[]'::jsonb
            )
            FROM jsonb_array_elements(backups) WITH ORDINALITY AS t(b, ord)
        )
        WHERE name = $1
        "#,
    )
    .bind(project_name)
    .bind(backup_id)
    .bind(Json(restores))
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Get a project with its progress.
pub async fn get_project(pool: &DbPool, project_name: &str) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {} FROM launchpad.project WHERE name = $1",
        PROJECT_COLUMNS
    ))
    .bind(project_name)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let steps = sqlx::query_as::<_, ProjectStepRow>(
        r#"
        SELECT project_name, key, step, health, message, status_code
        FROM launchpad.project_step
        WHERE project_name = $1
        ORDER BY position ASC
        "#,
    )
    .bind(project_name)
    .fetch_all(pool)
    .await?;

    let progress = steps.into_iter().filter_map(ProjectStepRow::into_step).collect();
    Ok(Some(row.into_project(progress)))
}

/// List all projects, most recently created first.
pub async fn list_projects(pool: &DbPool) -> Result<Vec<Project>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ProjectRow>(&format!(
        "SELECT {} FROM launchpad.project ORDER BY created_at DESC, name DESC",
        PROJECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    let steps = sqlx::query_as::<_, ProjectStepRow>(
        r#"
        SELECT project_name, key, step, health, message, status_code
        FROM launchpad.project_step
        ORDER BY project_name, position ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut progress = group_steps(steps);
    Ok(rows
        .into_iter()
        .map(|row| {
            let steps = progress.remove(&row.name).unwrap_or_default();
            row.into_project(steps)
        })
        .collect())
}

/// Group step rows by project, keeping the order the rows arrived in.
fn group_steps(steps: Vec<ProjectStepRow>) -> HashMap<String, Vec<ProgressStep>> {
    let mut progress: HashMap<String, Vec<ProgressStep>> = HashMap::new();
    for row in steps {
        let project_name = row.project_name.clone();
        if let Some(step) = row.into_step() {
            progress.entry(project_name).or_default().push(step);
        }
    }
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Health;

    fn row(project: &str, key: StepKey, health: &str) -> ProjectStepRow {
        ProjectStepRow {
            project_name: project.to_string(),
            key: key.as_str().to_string(),
            step: key.label().to_string(),
            health: health.to_string(),
            message: None,
            status_code: None,
        }
    }

    #[test]
    fn test_positions_follow_step_order() {
        let positions: Vec<_> = StepKey::ALL.iter().map(|k| k.position()).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(positions, sorted);
        assert_eq!(positions.len(), 11);
    }

    #[test]
    fn test_group_steps_by_project() {
        let mut rows = Vec::new();
        for key in StepKey::ALL {
            rows.push(row("blog", key, "SUCCESS"));
        }
        for key in StepKey::ALL {
            rows.push(row("shop", key, "NOT_STARTED"));
        }
        rows.push(ProjectStepRow {
            key: "retired".to_string(),
            ..row("shop", StepKey::Project, "SUCCESS")
        });

        let progress = group_steps(rows);
        assert_eq!(progress.len(), 2);
        let keys: Vec<_> = progress["blog"].iter().map(|s| s.key).collect();
        assert_eq!(keys, StepKey::ALL.to_vec());
        assert_eq!(progress["shop"].len(), 11);
        assert!(progress["shop"].iter().all(|s| s.health == Health::NotStarted));
    }
}
