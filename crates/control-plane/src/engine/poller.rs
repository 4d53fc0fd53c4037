//! Recurring completion checks.
//!
//! A poller is driven on a fixed interval until it reports [`PollOutcome::Done`],
//! runs out of ticks, or is cancelled. Live pollers are tracked in a
//! [`PollerRegistry`] keyed by project and resource; arming a key that is
//! already live cancels the previous poller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::db::models::StepKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Continue,
    Done,
}

#[async_trait]
pub trait Poll: Send + 'static {
    async fn tick(&mut self) -> PollOutcome;

    /// Called once when a bounded schedule runs out of ticks.
    async fn on_exhausted(&mut self) {}
}

/// Shortest period a poller runs at. A zero period would spin the task.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interval and optional tick bound of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_ticks: Option<u32>,
}

impl PollSchedule {
    pub fn bounded(interval: Duration, max_ticks: u32) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            max_ticks: Some(max_ticks),
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollerKey {
    pub project: String,
    pub resource: StepKey,
}

impl PollerKey {
    pub fn new(project: &str, resource: StepKey) -> Self {
        Self {
            project: project.to_string(),
            resource,
        }
    }
}

struct Entry {
    generation: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Inner {
    pollers: HashMap<PollerKey, Entry>,
    next_generation: u64,
}

/// Live pollers of this process.
#[derive(Clone, Default)]
pub struct PollerRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start `poller` under `key`, cancelling any poller already there.
    pub fn spawn<P: Poll>(
        &self,
        key: PollerKey,
        schedule: PollSchedule,
        mut poller: P,
    ) -> CancellationToken {
        let token = CancellationToken::new();
        let generation = {
            let mut inner = self.lock();
            inner.next_generation += 1;
            let generation = inner.next_generation;
            let previous = inner.pollers.insert(
                key.clone(),
                Entry {
                    generation,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                tracing::debug!(project = %key.project, resource = %key.resource, "Replacing live poller");
                previous.token.cancel();
            }
            generation
        };

        let registry = self.clone();
        let task_token = token.clone();
        let period = schedule.interval.max(MIN_POLL_INTERVAL);
        tokio::spawn(async move {
            tracing::debug!(
                project = %key.project,
                resource = %key.resource,
                interval_ms = period.as_millis() as u64,
                "Poller started"
            );

            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            let mut ticks: u32 = 0;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => {
                        tracing::debug!(project = %key.project, resource = %key.resource, "Poller cancelled");
                        break;
                    }
                    _ = interval.tick() => {}
                }

                ticks += 1;
                if poller.tick().await == PollOutcome::Done {
                    tracing::debug!(project = %key.project, resource = %key.resource, ticks, "Poller finished");
                    break;
                }

                if schedule.max_ticks.is_some_and(|max| ticks >= max) {
                    tracing::warn!(project = %key.project, resource = %key.resource, ticks, "Poller exhausted");
                    poller.on_exhausted().await;
                    break;
                }
            }

            task_token.cancel();
            registry.remove(&key, generation);
        });

        token
    }

    fn remove(&self, key: &PollerKey, generation: u64) {
        let mut inner = self.lock();
        if inner
            .pollers
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            inner.pollers.remove(key);
        }
    }

    pub fn is_active(&self, key: &PollerKey) -> bool {
        self.lock().pollers.contains_key(key)
    }

    pub fn active_count(&self) -> usize {
        self.lock().pollers.len()
    }

    pub fn cancel_all(&self) {
        let mut inner = self.lock();
        for (_, entry) in inner.pollers.drain() {
            entry.token.cancel();
        }
    }
}
