// src/retry.rs
//
// Exponential backoff with jitter for calls to remote services.
// Only errors that report `is_transient()` are retried; everything else is
// returned on the first failure.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one. 1 disables retrying.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 250,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Nominal wait after `current`: grown by `backoff_multiplier`, capped
    /// at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_multiplier)
            .map_or(self.max_delay(), |grown| grown.min(self.max_delay()))
    }

    /// Nominal wait before each retry, in order. Yields one entry fewer than
    /// `max_attempts`.
    fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        std::iter::successors(Some(self.initial_delay().min(self.max_delay())), |d| {
            Some(self.next_delay(*d))
        })
        .take(retries)
    }
}

/// Spreads `nominal` over [0.5x, 1.5x).
fn jitter(nominal: Duration) -> Duration {
    nominal.mul_f64(rand::thread_rng().gen_range(0.5..1.5))
}

/// Runs `operation` until it succeeds, fails permanently, or
/// `config.max_attempts` is exhausted. The last error is returned verbatim.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let total = config.max_attempts.max(1);
    let mut delays = config.delays();
    let mut attempt = 1u32;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => e,
        };

        let Some(nominal) = delays.next() else {
            log::error!("{} failed after {} attempt(s): {}", operation_name, attempt, err);
            return Err(err);
        };

        let wait = jitter(nominal);
        log::warn!(
            "{} attempt {}/{} failed ({}), retrying in {} ms",
            operation_name,
            attempt,
            total,
            err,
            wait.as_millis()
        );
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}
