//! Shared request pacer.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("rate must be a positive number of requests per second, got {0}")]
    InvalidRate(f64),
}

/// Hands out request slots no closer together than `1 / rate` seconds.
///
/// Callers reserve the next slot under a short lock, then sleep outside it,
/// so waiters queue up in arrival order without holding the mutex.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64) -> Result<Self, RateLimitError> {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Err(RateLimitError::InvalidRate(requests_per_second));
        }
        Ok(Self {
            interval: Duration::from_secs_f64(1.0 / requests_per_second),
            next_slot: Mutex::new(Instant::now()),
        })
    }

    /// Minimum spacing between consecutive requests.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until this caller may issue a request.
    pub async fn acquire(&self) {
        let wait = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = (*next).max(now);
            *next = slot + self.interval;
            slot - now
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}
