//! Retry and timing wrappers
//!
//! Both are plain higher-order async functions composed at the call
//! site: `timed("hunt", retry_with_backoff(&policy, "login", || ...))`.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HttpError;

/// Retry configuration with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Backoff before the second attempt, in milliseconds
    pub initial_backoff_ms: u64,

    /// Backoff ceiling, in milliseconds
    pub max_backoff_ms: u64,

    /// Backoff multiplier (2.0 for exponential)
    pub backoff_multiplier: f64,

    /// Randomize each backoff by up to 30%
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Calculate backoff duration after a given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let capped = base.min(self.max_backoff_ms as f64);

        let with_jitter = if self.jitter && capped > 0.0 {
            let range = capped * 0.3;
            let jitter = rand::rng().random_range(-range..range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(with_jitter as u64)
    }
}

/// Retry a transport operation while its error is retryable.
///
/// Non-retryable errors and the last retryable error are returned as-is.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, HttpError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HttpError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, operation = operation_name, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) => {
                let retryable = err.is_retryable();
                warn!(
                    attempt,
                    max_attempts,
                    operation = operation_name,
                    error = %err,
                    retryable,
                    "Operation failed"
                );

                if !retryable || attempt >= max_attempts {
                    return Err(err);
                }

                let backoff = policy.backoff(attempt);
                debug!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    operation = operation_name,
                    "Backing off before retry"
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Await a future and log how long it took
pub async fn timed<Fut, T>(operation_name: &str, future: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let start = Instant::now();
    info!(operation = operation_name, "Starting");
    let output = future.await;
    info!(
        operation = operation_name,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Completed"
    );
    output
}
