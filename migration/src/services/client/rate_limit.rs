//! Per-endpoint request spacing against the platform's rate limits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default requests-per-minute allowance per endpoint.
const DEFAULT_RATE_LIMIT: u32 = 30;

/// Seconds to back off after the platform answers 429.
pub(crate) const RATE_LIMIT_BACKOFF_SECS: u64 = 60;

/// Spaces requests so no endpoint is hit faster than its per-minute
/// allowance. Tracks the last scheduled request time per endpoint.
#[derive(Debug)]
pub struct RateLimiter {
    per_minute: u32,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_RATE_LIMIT)
    }

    pub fn with_limit(per_minute: u32) -> Self {
        Self {
            per_minute,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Minimum spacing between two requests to the same endpoint.
    fn interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.per_minute.max(1)))
    }

    /// Reserve a send slot for `endpoint`, returning how long the caller
    /// must wait before sending. The slot is claimed immediately so
    /// sequential callers space out correctly.
    fn reserve(&self, endpoint: &str, now: Instant) -> Duration {
        let interval = self.interval();
        let mut last = self
            .last_request
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let wait = match last.get(endpoint) {
            Some(previous) => {
                let elapsed = now.saturating_duration_since(*previous);
                interval.saturating_sub(elapsed)
            }
            None => Duration::ZERO,
        };
        last.insert(endpoint.to_string(), now + wait);
        wait
    }

    /// Wait until `endpoint` may be hit again.
    pub async fn acquire(&self, endpoint: &str) {
        let wait = self.reserve(endpoint, Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        assert_eq!(limiter.reserve("/tenants/resources/tenants/v2", now), Duration::ZERO);
    }

    #[test]
    fn test_back_to_back_requests_are_spaced() {
        let limiter = RateLimiter::with_limit(30);
        let now = Instant::now();
        assert_eq!(limiter.reserve("/a", now), Duration::ZERO);

        // Immediately after, the full 2s interval remains.
        let wait = limiter.reserve("/a", now);
        assert_eq!(wait, Duration::from_secs(2));

        // A different endpoint is not throttled.
        assert_eq!(limiter.reserve("/b", now), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_acquire_does_not_block_distinct_endpoints() {
        let limiter = RateLimiter::new();
        limiter.acquire("/tenants/resources/tenants/v2").await;
        limiter.acquire("/identity/resources/permissions/v1").await;
        limiter.acquire("/identity/resources/roles/v2").await;
    }

    #[test]
    fn test_elapsed_time_reduces_wait() {
        let limiter = RateLimiter::with_limit(30);
        let start = Instant::now();
        limiter.reserve("/a", start);

        let later = start + Duration::from_millis(1500);
        let wait = limiter.reserve("/a", later);
        assert_eq!(wait, Duration::from_millis(500));

        // After a full interval has passed, no wait at all.
        let much_later = later + Duration::from_secs(5);
        assert_eq!(limiter.reserve("/a", much_later), Duration::ZERO);
    }
}
