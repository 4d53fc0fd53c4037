//! Bounded retries with configurable backoff.

use std::future::Future;
use std::time::Duration;

use crate::provider::ApiResult;

/// How an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Try again if the policy allows.
    Retry(E),
    /// Give up now.
    Abort(E),
}

/// Retry policy.
///
/// Before each wait the delay is first increased by `delay_increase`, then
/// multiplied by `delay_multiplier`, so the first wait already includes both.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    pub delay_increase: Option<Duration>,
    pub delay_multiplier: Option<f64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_millis(2000))
    }
}

impl RetryPolicy {
    /// Constant delay between attempts.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            delay_increase: None,
            delay_multiplier: None,
        }
    }

    pub fn with_increase(mut self, increase: Duration) -> Self {
        self.delay_increase = Some(increase);
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.delay_multiplier = Some(multiplier);
        self
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let mut next = delay;
        if let Some(increase) = self.delay_increase {
            next = next.saturating_add(increase);
        }
        if let Some(multiplier) = self.delay_multiplier {
            next = Duration::try_from_secs_f64(next.as_secs_f64() * multiplier).unwrap_or(next);
        }
        next
    }

    /// Run `op` until it succeeds, aborts, or retries run out.
    ///
    /// `op` receives the zero-based attempt number. At most
    /// `max_retries + 1` attempts are made.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RetryError<E>>>,
    {
        let mut attempt = 0;
        let mut delay = self.delay;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(RetryError::Abort(e)) => return Err(e),
                Err(RetryError::Retry(e)) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    delay = self.next_delay(delay);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Call the provisioning API under `policy`.
///
/// Transient failures are retried; permanent ones are returned at once. The
/// last attempt hands its failure back as a value instead of being retried.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let max_retries = policy.max_retries;

    policy
        .run(|attempt| {
            let fut = call();
            async move {
                match fut.await {
                    Ok(value) => Ok(Ok(value)),
                    Err(e) if attempt >= max_retries => Ok(Err(e)),
                    Err(e) if e.is_transient() => Err(RetryError::Retry(e)),
                    Err(e) => Err(RetryError::Abort(e)),
                }
            }
        })
        .await
        .and_then(|result| result)
}
