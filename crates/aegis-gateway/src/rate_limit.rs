//! Fixed-window rate limiter (§4.11 "fixed-window counter per (route,
//! user-or-anonymous) keyed by the rate-limit group's name"). Counters
//! live in a `Mutex`-guarded map, the same "shared store, Phase-1
//! in-memory backend" pattern as `aegis-scan-domain::ScanEventRecorder`;
//! a real deployment would back this with the shared store the spec
//! requires ("no node-local rate is authoritative"), not a per-node cache.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
struct Window {
    start: DateTime<Utc>,
    count: u32,
}

pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

/// One named group, e.g. `config.rate_limit_groups["default"]`.
pub struct RateLimitGroup {
    pub requests: u32,
    pub window_seconds: u64,
}

#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `key` is typically `"{route}:{user_or_anonymous}"`.
    pub fn check(&self, key: &str, group: &RateLimitGroup) -> RateLimitDecision {
        let now = Utc::now();
        let mut windows = self.windows.lock().unwrap();
        let window = windows.entry(key.to_string()).or_insert_with(|| Window { start: now, count: 0 });

        let elapsed = now.signed_duration_since(window.start).num_seconds().max(0) as u64;
        if elapsed >= group.window_seconds {
            window.start = now;
            window.count = 0;
        }

        if window.count >= group.requests {
            let remaining = group.window_seconds.saturating_sub(elapsed);
            return RateLimitDecision { allowed: false, retry_after_secs: remaining };
        }

        window.count += 1;
        RateLimitDecision { allowed: true, retry_after_secs: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_blocks() {
        let limiter = RateLimiter::new();
        let group = RateLimitGroup { requests: 2, window_seconds: 60 };
        assert!(limiter.check("route:anon", &group).allowed);
        assert!(limiter.check("route:anon", &group).allowed);
        let decision = limiter.check("route:anon", &group);
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs <= 60);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let group = RateLimitGroup { requests: 1, window_seconds: 60 };
        assert!(limiter.check("route:alice", &group).allowed);
        assert!(limiter.check("route:bob", &group).allowed);
    }
}
