//! Proactive token-bucket admission control.
//!
//! A call that finds the bucket empty is rejected immediately with
//! [`AppError::RateLimited`] instead of waiting. Waiting is left to the
//! outer retry policy, which applies jittered backoff.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::{AppError, Result};

/// Token bucket state: refills to `capacity` over `period`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    period: Duration,
    tokens: f64,
    last_check: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    #[must_use]
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self::new_at(capacity, period, Instant::now())
    }

    /// Create a full bucket whose clock starts at `now`.
    #[must_use]
    pub fn new_at(capacity: u32, period: Duration, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            period,
            tokens: capacity,
            last_check: now,
        }
    }

    /// Refill for the time elapsed since the last check, then take one
    /// token if available.
    pub fn try_take_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_check);
        self.last_check = now;

        let period = self.period.as_secs_f64();
        let refill = if period > 0.0 {
            elapsed.as_secs_f64() / period * self.capacity
        } else {
            self.capacity
        };
        self.tokens = (self.tokens + refill).min(self.capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently held, always within `[0, capacity]`.
    #[must_use]
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}

/// A named token bucket guarding one wrapped operation.
///
/// Capacity and period are fixed when the limiter is built.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Limit `name` to `capacity` calls per `period`.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: u32, period: Duration) -> Self {
        Self {
            name: name.into(),
            bucket: Mutex::new(TokenBucket::new(capacity, period)),
        }
    }

    /// Admit one call now or fail fast.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RateLimited` when no token is available.
    pub fn try_acquire(&self) -> Result<()> {
        self.try_acquire_at(Instant::now())
    }

    /// [`RateLimiter::try_acquire`] evaluated at an explicit instant.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RateLimited` when no token is available.
    pub fn try_acquire_at(&self, now: Instant) -> Result<()> {
        let admitted = self
            .bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_take_at(now);
        if admitted {
            Ok(())
        } else {
            debug!(operation = %self.name, "proactive rate limit rejection");
            Err(AppError::RateLimited(format!(
                "{} exceeded its call budget",
                self.name
            )))
        }
    }

    /// Run `call` if a token is available; otherwise reject without
    /// polling it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RateLimited` on rejection, or whatever `call`
    /// returns.
    pub async fn run<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.try_acquire()?;
        call.await
    }
}
