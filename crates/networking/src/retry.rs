//! Retry with linearly increasing backoff
//!
//! Only transport failures are retried. The client marks an attempt's error
//! as transient (retry) or permanent (give up now) and this module decides
//! how long to wait in between.

use backoff::backoff::Backoff;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::config::serde_millis;
use crate::{Error, Result};

/// Configuration for retry delays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failed attempt; later waits grow linearly
    #[serde(with = "serde_millis")]
    pub base_delay: Duration,
    /// Upper bound for a single wait
    #[serde(with = "serde_millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { base_delay: Duration::from_secs(1), max_delay: Duration::from_secs(10) }
    }
}

impl RetryConfig {
    /// Create a retry configuration with the given base delay
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay, ..Default::default() }
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Reject a base delay longer than the cap
    pub fn validate(&self) -> Result<()> {
        if self.base_delay > self.max_delay {
            return Err(Error::Config("retry base delay exceeds max delay".into()));
        }
        Ok(())
    }

    /// Wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt).unwrap_or(u32::MAX);
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }
}

/// Backoff schedule yielding `retries` linearly growing waits, then stopping
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    config: RetryConfig,
    retries: usize,
    attempt: usize,
}

impl LinearBackoff {
    /// Schedule for at most `retries` retries
    pub fn new(config: RetryConfig, retries: usize) -> Self {
        Self { config, retries, attempt: 0 }
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.retries {
            return None;
        }
        self.attempt += 1;
        Some(self.config.delay_for(self.attempt))
    }
}

/// Mark an attempt's error as worth retrying
pub fn transient(err: Error) -> backoff::Error<Error> {
    backoff::Error::transient(err)
}

/// Mark an attempt's error as final
pub fn permanent(err: Error) -> backoff::Error<Error> {
    backoff::Error::permanent(err)
}

/// Run `operation` up to `retries + 1` times
///
/// Transient errors are retried after [`RetryConfig::delay_for`]; a
/// permanent error or the last transient one is returned as is.
///
/// # Examples
/// ```
/// use networking::retry::{retry, RetryConfig};
/// use std::time::Duration;
///
/// async fn example() -> networking::Result<u32> {
///     let config = RetryConfig::new(Duration::from_millis(50));
///     retry(&config, 2, || async { Ok(42) }).await
/// }
/// ```
pub async fn retry<F, Fut, T>(config: &RetryConfig, retries: usize, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, backoff::Error<Error>>>,
{
    let schedule = LinearBackoff::new(config.clone(), retries);

    backoff::future::retry_notify(schedule, operation, |err: Error, wait: Duration| {
        tracing::warn!("Attempt failed, retrying in {:?}: {}", wait, err);
    })
    .await
}
