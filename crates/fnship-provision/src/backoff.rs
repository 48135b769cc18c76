//! Bounded exponential backoff for provider calls.
//!
//! Only errors classified as transient are retried. The delay doubles after
//! every failed attempt and is capped at `max_delay`.

use std::future::Future;
use std::time::Duration;

use fnship_core::config::ProvisionConfig;
use tracing::warn;

use crate::error::ProviderResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self::new(
            config.retry_attempts,
            config.retry_initial(),
            config.retry_max(),
        )
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            delay = (delay * 2).min(self.max_delay);
        }
        delay.min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut call: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
