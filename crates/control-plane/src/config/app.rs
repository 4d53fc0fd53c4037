//! Application configuration for the Launchpad Control Plane server.

use std::time::Duration;

use serde::Deserialize;

use crate::engine::{OrchestratorTiming, PollSchedule};
use crate::retry::RetryPolicy;

/// Which ledger implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `LAUNCHPAD_`:
/// - `LAUNCHPAD_HOST`: Server bind address (default: "0.0.0.0")
/// - `LAUNCHPAD_PORT`: Server port (default: 8080)
/// - `LAUNCHPAD_LEDGER`: `postgres` or `memory` (default: postgres)
/// - `LAUNCHPAD_DOMAIN_NAME`: Parent domain for project subdomains
/// - `LAUNCHPAD_APP_URL`: Public URL of this server, handed to the setup job
/// - `LAUNCHPAD_RETRY_*`: Retry policy for resource creation
/// - `LAUNCHPAD_*_POLL_INTERVAL_SECS`: Poller periods
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server name for identification
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Ledger backend
    #[serde(default = "default_ledger")]
    pub ledger: LedgerBackend,

    /// Emit JSON logs instead of the human readable format
    #[serde(default)]
    pub log_json: bool,

    /// Parent domain under which project subdomains are created
    #[serde(default = "default_domain_name")]
    pub domain_name: String,

    /// Public URL of this server (the setup job reports back to it)
    #[serde(default = "default_app_url")]
    pub app_url: String,

    /// Delay between accepting a deployment and starting the workflow
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,

    /// Settling delay before the subdomain is assigned
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Retries for resource creation calls
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Additive delay increase per failed attempt
    #[serde(default)]
    pub retry_delay_increase_ms: Option<u64>,

    /// Multiplicative delay increase per failed attempt
    #[serde(default)]
    pub retry_delay_multiplier: Option<f64>,

    /// Attempts to assign a subdomain while the service is not yet visible
    #[serde(default = "default_assign_max_attempts")]
    pub assign_max_attempts: u32,

    /// Delay between subdomain assignment attempts
    #[serde(default = "default_assign_delay_ms")]
    pub assign_delay_ms: u64,

    /// Service poller period
    #[serde(default = "default_ten")]
    pub service_poll_interval_secs: u64,

    /// Addon poller period
    #[serde(default = "default_ten")]
    pub addon_poll_interval_secs: u64,

    /// Domain verification poller period
    #[serde(default = "default_domain_poll_interval")]
    pub domain_poll_interval_secs: u64,

    /// Failed verifications before the domain is marked failed
    #[serde(default = "default_ten_u32")]
    pub domain_max_attempts: u32,

    /// Upper bound on service and addon poller ticks
    #[serde(default = "default_poll_max_ticks")]
    pub poll_max_ticks: u32,

    /// Timeout for outbound HTTP calls in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_server_name() -> String {
    "launchpad-control-plane".to_string()
}

fn default_ledger() -> LedgerBackend {
    LedgerBackend::Postgres
}

fn default_domain_name() -> String {
    "strapi.run".to_string()
}

fn default_app_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_start_delay_ms() -> u64 {
    3000
}

fn default_settle_delay_ms() -> u64 {
    3000
}

fn default_retry_max() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_assign_max_attempts() -> u32 {
    20
}

fn default_assign_delay_ms() -> u64 {
    3000
}

fn default_ten() -> u64 {
    10
}

fn default_ten_u32() -> u32 {
    10
}

fn default_domain_poll_interval() -> u64 {
    3
}

fn default_poll_max_ticks() -> u32 {
    360
}

fn default_http_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `LAUNCHPAD_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("LAUNCHPAD_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry policy for resource creation calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::fixed(self.retry_max, Duration::from_millis(self.retry_delay_ms));
        if let Some(increase) = self.retry_delay_increase_ms {
            policy = policy.with_increase(Duration::from_millis(increase));
        }
        if let Some(multiplier) = self.retry_delay_multiplier {
            policy = policy.with_multiplier(multiplier);
        }
        policy
    }

    /// Retry policy for assigning a subdomain to a service that may not be visible yet.
    pub fn assignment_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.assign_max_attempts.saturating_sub(1),
            Duration::from_millis(self.assign_delay_ms),
        )
    }

    /// Delays and poller schedules used by the orchestrator.
    pub fn timing(&self) -> OrchestratorTiming {
        OrchestratorTiming {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            service_poll: PollSchedule::bounded(
                Duration::from_secs(self.service_poll_interval_secs),
                self.poll_max_ticks,
            ),
            addon_poll: PollSchedule::bounded(
                Duration::from_secs(self.addon_poll_interval_secs),
                self.poll_max_ticks,
            ),
            domain_poll: PollSchedule::unbounded(Duration::from_secs(
                self.domain_poll_interval_secs,
            )),
            domain_max_attempts: self.domain_max_attempts,
        }
    }

    /// Delay between accepting a deployment and running its workflow.
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }

    /// Timeout for outbound HTTP calls.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            server_name: default_server_name(),
            ledger: default_ledger(),
            log_json: false,
            domain_name: default_domain_name(),
            app_url: default_app_url(),
            start_delay_ms: default_start_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            retry_max: default_retry_max(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_delay_increase_ms: None,
            retry_delay_multiplier: None,
            assign_max_attempts: default_assign_max_attempts(),
            assign_delay_ms: default_assign_delay_ms(),
            service_poll_interval_secs: default_ten(),
            addon_poll_interval_secs: default_ten(),
            domain_poll_interval_secs: default_domain_poll_interval(),
            domain_max_attempts: default_ten_u32(),
            poll_max_ticks: default_poll_max_ticks(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}
