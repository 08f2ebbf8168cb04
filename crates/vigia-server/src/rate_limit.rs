use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Counter store consulted at the trigger boundary.
///
/// Injected rather than kept as module-level state so multi-instance
/// deployments can swap in a shared backend.
pub trait RateLimitStore: Send + Sync {
    /// Records a hit for `key` and returns true while the caller is within
    /// budget for the current window.
    fn check(&self, key: &str, now: DateTime<Utc>) -> bool;
}

/// Fixed-window in-memory counters, suitable for a single instance.
pub struct FixedWindowRateLimiter {
    max_per_window: u32,
    window: Duration,
    counters: Mutex<HashMap<String, (DateTime<Utc>, u32)>>,
}

impl FixedWindowRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_hour(max_per_window: u32) -> Self {
        Self::new(max_per_window, Duration::hours(1))
    }
}

impl RateLimitStore for FixedWindowRateLimiter {
    fn check(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut counters = self.counters.lock().unwrap();
        let entry = counters.entry(key.to_string()).or_insert((now, 0));
        if now - entry.0 >= self.window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= self.max_per_window
    }
}

/// Pass-through limiter used when rate limiting is disabled in config.
pub struct NoopRateLimiter;

impl RateLimitStore for NoopRateLimiter {
    fn check(&self, _key: &str, _now: DateTime<Utc>) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_budget_and_resets_on_new_window() {
        let limiter = FixedWindowRateLimiter::new(2, Duration::minutes(10));
        let t0 = Utc::now();
        assert!(limiter.check("run", t0));
        assert!(limiter.check("run", t0));
        assert!(!limiter.check("run", t0));

        // Other keys have their own budget.
        assert!(limiter.check("other", t0));

        // A new window resets the counter.
        let t1 = t0 + Duration::minutes(11);
        assert!(limiter.check("run", t1));
    }
}
