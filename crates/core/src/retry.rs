//! Bounded retry with exponential backoff and jitter for outbound calls.

use crate::error::TutorError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often, and how patiently, a failing outbound call is tried again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Values below 1 behave like 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_millis(2_000),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// The un-jittered delay before retry number `retry_index` (0-based),
    /// doubling from `initial_backoff` and capped at `max_backoff`.
    pub fn backoff(&self, retry_index: u32) -> Duration {
        let cap = self.max_backoff.max(self.initial_backoff);
        let factor = 1u32.checked_shl(retry_index.min(20)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(cap)
    }

    /// Picks a delay uniformly from the upper half of the backoff window.
    fn jittered_backoff(&self, retry_index: u32) -> Duration {
        let ceiling = self.backoff(retry_index).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        let millis = rand::rng().random_range(ceiling / 2..=ceiling);
        Duration::from_millis(millis)
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the
    /// attempts are exhausted. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, TutorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TutorError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.jittered_backoff(attempt - 1);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient upstream failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
