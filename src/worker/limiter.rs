/// Per-principal API rate limiter
///
/// A sliding one-minute window per `rate_key`, implemented as a deque of
/// event timestamps under a dedicated per-key mutex (via `DashMap`).
/// Keyed the same way for both API-key and JWT principals so both
/// credential types are throttled symmetrically.
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

const WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    buckets: DashMap<String, Mutex<Vec<Instant>>>,
    limit_per_minute: u32,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            limit_per_minute,
        }
    }

    /// Record an attempt for `rate_key`; true if it is allowed.
    pub fn allow(&self, rate_key: &str) -> bool {
        let now = Instant::now();
        let bucket = self
            .buckets
            .entry(rate_key.to_string())
            .or_insert_with(|| Mutex::new(Vec::new()));
        let mut events = bucket.lock().expect("rate limiter bucket mutex poisoned");

        events.retain(|t| now.duration_since(*t) < WINDOW);

        if events.len() as u32 >= self.limit_per_minute {
            false
        } else {
            events.push(now);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_configured_limit_then_rejects() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.allow("k1"));
        assert!(limiter.allow("k1"));
        assert!(!limiter.allow("k1"));
    }

    #[test]
    fn buckets_are_independent_per_key() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.allow("k1"));
        assert!(limiter.allow("k2"));
        assert!(!limiter.allow("k1"));
    }
}
