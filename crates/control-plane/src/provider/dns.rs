//! DNS provider used to publish project subdomains.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::DnsConfig;

/// Record to create in the zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create a record. Any error means the record is not in place.
    async fn create_record(&self, record: &DnsRecord) -> anyhow::Result<()>;

    /// TTL applied to records created for new subdomains.
    fn ttl(&self) -> u32 {
        120
    }
}

#[derive(Deserialize)]
struct CloudflareResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Cloudflare zone client.
#[derive(Clone)]
pub struct CloudflareDns {
    http: reqwest::Client,
    base_url: String,
    zone_id: String,
    api_key: String,
    ttl: u32,
}

impl CloudflareDns {
    pub fn new(config: &DnsConfig, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            zone_id: config.zone_id.clone(),
            api_key: config.api_key.clone(),
            ttl: config.ttl,
        }
    }
}

#[async_trait]
impl DnsProvider for CloudflareDns {
    async fn create_record(&self, record: &DnsRecord) -> anyhow::Result<()> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, self.zone_id);
        let response: CloudflareResponse = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(record)
            .send()
            .await
            .context("create dns record: send")?
            .json()
            .await
            .context("create dns record: parse response")?;

        if !response.success {
            anyhow::bail!("DNS provider rejected record {}: {:?}", record.name, response.errors);
        }

        tracing::info!(name = %record.name, record_type = %record.record_type, "DNS record created");
        Ok(())
    }

    fn ttl(&self) -> u32 {
        self.ttl
    }
}
