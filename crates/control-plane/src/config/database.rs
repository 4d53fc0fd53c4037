//! Connection and pool settings of the PostgreSQL ledger.

use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

/// Ledger database settings, read from `POSTGRES_*`:
/// - `POSTGRES_HOST`, `POSTGRES_PORT`, `POSTGRES_USER`, `POSTGRES_PASSWORD`,
///   `POSTGRES_DATABASE`: where the ledger lives
/// - `POSTGRES_MAX_CONNECTIONS`: pool size (default: 10)
/// - `POSTGRES_ACQUIRE_TIMEOUT_SECS`: wait for a free connection (default: 30)
/// - `POSTGRES_IDLE_TIMEOUT_SECS`: close idle connections after this long
/// - `POSTGRES_ENSURE_SCHEMA`: create the ledger tables on startup (default: true)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Pollers, refreshes and HTTP reads share the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,

    #[serde(default = "default_ensure_schema")]
    pub ensure_schema: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "launchpad".to_string()
}

fn default_database() -> String {
    "launchpad".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_ensure_schema() -> bool {
    true
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("POSTGRES_").from_env::<DatabaseConfig>()
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database)
            .application_name("launchpad-control-plane")
    }

    /// Pool sizing and timeouts for the ledger pool.
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections.min(self.max_connections))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .idle_timeout(self.idle_timeout_secs.map(Duration::from_secs))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            database: default_database(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
            idle_timeout_secs: None,
            ensure_schema: default_ensure_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_options() {
        let config = DatabaseConfig {
            host: "ledger.internal".to_string(),
            port: 6543,
            ..DatabaseConfig::default()
        };
        let options = config.connect_options();
        assert_eq!(options.get_host(), "ledger.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "launchpad");
        assert_eq!(options.get_database(), Some("launchpad"));
    }

    #[test]
    fn test_pool_options() {
        let config = DatabaseConfig {
            max_connections: 4,
            min_connections: 8,
            acquire_timeout_secs: 5,
            idle_timeout_secs: Some(60),
            ..DatabaseConfig::default()
        };
        let options = config.pool_options();
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(60)));
        assert!(config.ensure_schema);
    }
}
