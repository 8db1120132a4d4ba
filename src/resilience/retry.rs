//! Randomized exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::Result;

/// When and how long to wait before re-running a failed call.
///
/// Only errors for which [`crate::AppError::is_retryable`] holds are
/// retried; everything else is returned on the first failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
    min_wait: Duration,
    max_wait: Duration,
}

impl RetryPolicy {
    /// Build a policy. `max_attempts` counts the first call; `None`
    /// retries forever.
    #[must_use]
    pub fn new(max_attempts: Option<u32>, min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_attempts,
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }

    /// Retry forever with the given wait bounds.
    #[must_use]
    pub fn unbounded(min_wait: Duration, max_wait: Duration) -> Self {
        Self::new(None, min_wait, max_wait)
    }

    /// Attempt cap including the first call, if any.
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Upper bound of the wait before attempt `attempt + 1`.
    ///
    /// Grows as `min_wait * 2^(attempt - 1)`, capped at `max_wait`.
    #[must_use]
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.min_wait.saturating_mul(factor).min(self.max_wait)
    }

    /// Random wait in `[min_wait, ceiling(attempt)]`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if ceiling <= self.min_wait {
            return self.min_wait;
        }
        rand::thread_rng().gen_range(self.min_wait..=ceiling)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the attempt cap is reached.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last retryable one
    /// once attempts are exhausted.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1_u32;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) if self.exhausted(attempt) => {
                    warn!(operation, attempt, error = %err, "retry attempts exhausted");
                    return Err(err);
                }
                Err(err) => {
                    let wait = self.backoff(attempt);
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        error = %err,
                        wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                        "retrying after transient failure"
                    );
                    sleep(wait).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Some(8), Duration::from_secs(1), Duration::from_secs(60))
    }
}
