//! Bounded retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::backoff_delay;

/// Errors that know whether retrying could help.
pub trait Retryable {
    /// Worth another attempt (throttling, 5xx, timeouts, connection resets).
    fn is_transient(&self) -> bool;

    /// The server asked us to slow down.
    fn is_throttled(&self) -> bool {
        false
    }

    /// Server-provided wait before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Backoff base for network errors and server faults.
    pub base_delay: Duration,
    /// Backoff base when the server is throttling us.
    pub throttle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(3),
            throttle_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts; for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            throttle_delay: Duration::ZERO,
        }
    }

    /// Delay before retrying after `error` on the given zero-based attempt.
    pub fn delay_for<E: Retryable>(&self, error: &E, attempt: u32) -> Duration {
        let base = if error.is_throttled() {
            self.throttle_delay
        } else {
            self.base_delay
        };
        let backoff = backoff_delay(attempt, base.as_millis() as u64);
        match error.retry_after() {
            Some(hint) => backoff.max(hint),
            None => backoff,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the zero-based attempt number. The last error is returned
    /// when every attempt failed.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay_for(&e, attempt);
                    debug!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        label,
                        attempt + 1,
                        attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
