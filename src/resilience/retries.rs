//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is worth another attempt
//! - Execute attempts with exponential backoff + jitter
//! - Enforce a hard attempt ceiling
//!
//! # Design Decisions
//! - Only transport-level failures are retried; a received error status is an answer
//! - The attempt count includes the first try, so `max_attempts = 1` means no retry
//! - Nothing here retries indefinitely

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::{calculate_backoff, max_backoff};

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Attempt ceiling and backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after `failed_attempts` failures.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        calculate_backoff(failed_attempts, millis(self.base_delay), millis(self.max_delay))
    }

    /// Longest a caller can wait for a result: every attempt runs to
    /// `attempt_timeout` and every backoff draws its maximum.
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let attempts = self.max_attempts.max(1);
        let backoff = (1..attempts)
            .map(|a| max_backoff(a, millis(self.base_delay), millis(self.max_delay)))
            .fold(Duration::ZERO, Duration::saturating_add);
        attempt_timeout.saturating_mul(attempts).saturating_add(backoff)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error.
    Exhausted { attempts: u32, last: E },
    /// A non-retryable error ended the loop early.
    Aborted { attempts: u32, error: E },
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt budget is spent. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_retryable() => {
                return Err(RetryError::Aborted { attempts: attempt, error });
            }
            Err(error) if attempt >= max_attempts => {
                tracing::warn!(attempts = attempt, error = %error, "Retry budget exhausted");
                return Err(RetryError::Exhausted { attempts: attempt, last: error });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt);
                tracing::info!(attempt, delay = ?delay, error = %error, "Retrying after transport error");
                metrics::record_retry();
                tokio::time::sleep(delay).await;
            }
        }
    }
}
