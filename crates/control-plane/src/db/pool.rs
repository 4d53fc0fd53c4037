//! Database connection pool management.

use sqlx::PgPool;

use crate::config::DatabaseConfig;

/// Type alias for the PostgreSQL connection pool.
pub type DbPool = PgPool;

/// Create the ledger pool and, unless disabled, make sure the schema exists.
///
/// # Errors
///
/// Returns an error if the pool cannot connect or the schema cannot be created.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = config
        .pool_options()
        .connect_with(config.connect_options())
        .await?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    if config.ensure_schema {
        super::ensure_schema(&pool).await?;
    }

    Ok(pool)
}

/// Check if the database answers a trivial query.
pub async fn ping(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
