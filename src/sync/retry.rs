//! Bounded exponential backoff for transient failures.
//!
//! The API client and the persistence port never retry on their own;
//! every retry decision funnels through here so the policy stays in one
//! place and can be tested without a transport.

use std::future::Future;
use std::time::Duration;

use crate::config::SyncConfig;

/// Retry tuning.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts after the first failure
    pub max_retries: u32,
    /// Backoff before the first retry
    pub initial_backoff: Duration,
    /// Backoff ceiling
    pub max_backoff: Duration,
    /// Multiplier per attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// Backoff for the given zero-based attempt, capped at the ceiling.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_millis() as f64;
        let computed = base * self.backoff_multiplier.powi(attempt as i32);
        let capped = computed.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Run `operation`, retrying failures that `is_retryable` accepts.
///
/// Non-retryable errors and retry exhaustion both return the last error
/// to the caller, which absorbs it into the run outcome.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    is_retryable: impl Fn(&E) -> bool,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !is_retryable(&e) || attempt >= config.max_retries {
                    return Err(e);
                }
                tokio::time::sleep(config.backoff(attempt)).await;
                attempt += 1;
            }
        }
    }
}
