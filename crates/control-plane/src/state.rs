//! Shared state for the health endpoints.

use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::ledger::ProgressLedger;

/// State handed to the handlers that report on the server itself.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn ProgressLedger>,
    pub config: Arc<AppConfig>,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    pub fn new(ledger: Arc<dyn ProgressLedger>, config: AppConfig) -> Self {
        Self {
            ledger,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
