//! Request pacing and retry for archive traffic.
//!
//! A single [`RateLimiter`] is shared by every worker so the aggregate request
//! rate stays under the configured ceiling; [`RetryPolicy`] wraps individual
//! requests with exponential backoff.

mod limiter;
mod retry;

pub use limiter::{RateLimitError, RateLimiter};
pub use retry::{RetryPolicy, Retryable};

/// Parse Retry-After header value (seconds).
/// Returns duration to wait, or None if header is missing/invalid.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<std::time::Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| std::time::Duration::from_secs(secs.min(60)))
}

/// Calculate exponential backoff delay for a given attempt.
pub fn backoff_delay(attempt: u32, base_ms: u64) -> std::time::Duration {
    let delay_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    std::time::Duration::from_millis(delay_ms.min(60_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_backoff_delay_caps() {
        assert_eq!(backoff_delay(0, 3_000), Duration::from_secs(3));
        assert_eq!(backoff_delay(2, 3_000), Duration::from_secs(12));
        assert_eq!(backoff_delay(20, 3_000), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after(Some("7")), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(Some("600")), Some(Duration::from_secs(60)));
        assert_eq!(parse_retry_after(Some("soon")), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
