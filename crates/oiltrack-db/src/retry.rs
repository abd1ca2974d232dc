//! # Retry With Backoff
//!
//! Every repository call goes through [`RetryPolicy::run`]. Only transient
//! "unavailable" errors are retried; anything else returns at once.
//!
//! ```text
//! attempt 1 ──✗ unavailable──► sleep 1s
//! attempt 2 ──✗ unavailable──► sleep 2s
//! attempt 3 ──✗ unavailable──► Err(Unavailable)   (max_attempts = 3)
//!
//! attempt 1 ──✗ QueryFailed ──► Err(QueryFailed)  (no retry)
//! ```

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::error::DbResult;

/// Retry settings for store calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_interval: Duration,
    /// Growth factor between attempts.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Deterministic exponential schedule (no jitter, no elapsed-time cap).
    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.initial_interval,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.initial_interval * 64,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Runs `op`, retrying while it fails with an unavailable error.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let rows = self.retry
    ///     .run("list_branches", || self.list_once())
    ///     .await?;
    /// ```
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_unavailable() && attempt < self.max_attempts => {
                    let delay = backoff.next_backoff().unwrap_or(self.initial_interval);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Store unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
