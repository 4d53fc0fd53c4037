//! Credentials and endpoints for the external provisioning and DNS APIs.

use serde::Deserialize;

/// Provisioning API configuration.
///
/// Environment variables are prefixed with `NORTHFLANK_`:
/// - `NORTHFLANK_TOKEN`: API token (required in production)
/// - `NORTHFLANK_BASE_URL`: API root (default: "https://api.northflank.com")
/// - `NORTHFLANK_REGION`: Region for new projects (default: "europe-west")
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Bearer token
    #[serde(default)]
    pub token: String,

    /// API root URL
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Region for new projects
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_provider_url() -> String {
    "https://api.northflank.com".to_string()
}

fn default_region() -> String {
    "europe-west".to_string()
}

impl ProviderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("NORTHFLANK_").from_env::<ProviderConfig>()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: default_provider_url(),
            region: default_region(),
        }
    }
}

/// DNS provider configuration.
///
/// Environment variables are prefixed with `CLOUDFLARE_`:
/// - `CLOUDFLARE_ZONE_ID`: Zone holding the project records
/// - `CLOUDFLARE_API_KEY`: API token
/// - `CLOUDFLARE_BASE_URL`: API root (default: "https://api.cloudflare.com/client/v4")
/// - `CLOUDFLARE_TTL`: TTL of created records (default: 120)
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub zone_id: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_dns_url")]
    pub base_url: String,

    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_dns_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_ttl() -> u32 {
    120
}

impl DnsConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("CLOUDFLARE_").from_env::<DnsConfig>()
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            zone_id: String::new(),
            api_key: String::new(),
            base_url: default_dns_url(),
            ttl: default_ttl(),
        }
    }
}
