//! Ledger schema bootstrap.
//!
//! Each progress step is its own row, so writes to different keys of the
//! same project never contend on a shared document.

use crate::db::DbPool;

const STATEMENTS: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS launchpad",
    r#"
    CREATE TABLE IF NOT EXISTS launchpad.project (
        name TEXT PRIMARY KEY,
        public_name TEXT NOT NULL,
        domain TEXT NOT NULL,
        service_details JSONB,
        minio_details JSONB,
        postgresql_details JSONB,
        minio_connection_details JSONB,
        postgresql_connection_details JSONB,
        backups JSONB NOT NULL DEFAULT '[]'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS launchpad.project_step (
        project_name TEXT NOT NULL REFERENCES launchpad.project (name) ON DELETE CASCADE,
        key TEXT NOT NULL,
        position INTEGER NOT NULL,
        step TEXT NOT NULL,
        health TEXT NOT NULL,
        message TEXT,
        status_code INTEGER,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (project_name, key)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS project_created_at_idx ON launchpad.project (created_at DESC)",
];

/// Create the ledger schema if it does not exist yet.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!("Ledger schema ready");
    Ok(())
}
