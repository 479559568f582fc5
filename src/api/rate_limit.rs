use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Outcome of a rate-limit check, with the header-friendly numbers the
/// caller needs.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_in: Duration,
}

struct WindowState {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter keyed by caller identity.
///
/// In-process only; a multi-node deployment needs a shared store
/// behind the same interface.
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut windows = self.windows.lock();

        let state = windows.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            reset_at: now + self.window,
        });
        if now >= state.reset_at {
            state.count = 0;
            state.reset_at = now + self.window;
        }

        state.count += 1;
        RateDecision {
            allowed: state.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(state.count),
            reset_in: state.reset_at.saturating_duration_since(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = FixedWindowLimiter::new(3, 60);
        for _ in 0..3 {
            assert!(limiter.check("caller").allowed);
        }
        assert!(!limiter.check("caller").allowed);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowLimiter::new(1, 60);
        assert!(limiter.check("alpha").allowed);
        assert!(limiter.check("beta").allowed);
        assert!(!limiter.check("alpha").allowed);
    }

    #[test]
    fn test_window_resets() {
        let limiter = FixedWindowLimiter::new(1, 0);
        assert!(limiter.check("caller").allowed);
        // A zero-length window has always expired by the next check.
        assert!(limiter.check("caller").allowed);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = FixedWindowLimiter::new(2, 60);
        assert_eq!(limiter.check("caller").remaining, 1);
        assert_eq!(limiter.check("caller").remaining, 0);
        assert_eq!(limiter.check("caller").remaining, 0);
    }
}
