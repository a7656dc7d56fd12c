//! Fixed-window request counters held in process memory.
//!
//! Counters are advisory, not security-critical: the table is a single map
//! behind a mutex and increments are best-effort under concurrent requests.
//! Expired entries are swept lazily on access rather than by a background
//! timer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const ACTION_CREATE_FILE: &str = "create-file";
pub const ACTION_UPDATE_FILE: &str = "update-file";
pub const ACTION_DELETE_FILE: &str = "delete-file";
pub const ACTION_SAVE_ON_UNLOAD: &str = "save-on-unload";
pub const ACTION_GLOBAL: &str = "api-global";

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub const fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

const DEFAULT_LIMITS: &[(&str, RateLimitConfig)] = &[
    (
        ACTION_CREATE_FILE,
        RateLimitConfig::new(Duration::from_secs(60), 10),
    ),
    (
        ACTION_UPDATE_FILE,
        RateLimitConfig::new(Duration::from_secs(1), 5),
    ),
    (
        ACTION_DELETE_FILE,
        RateLimitConfig::new(Duration::from_secs(60), 20),
    ),
    (
        ACTION_SAVE_ON_UNLOAD,
        RateLimitConfig::new(Duration::from_secs(1), 2),
    ),
    (
        ACTION_GLOBAL,
        RateLimitConfig::new(Duration::from_secs(60), 100),
    ),
];

/// Outcome of a limit check. `reset_in` is whole seconds until the window
/// rolls over, rounded up for response headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decision {
    pub success: bool,
    pub remaining: u32,
    pub reset_in: u64,
    pub limit: u32,
}

struct Entry {
    count: u32,
    reset_at: Instant,
}

struct Table {
    entries: HashMap<String, Entry>,
    last_cleanup: Instant,
}

pub struct RateLimiter {
    limits: HashMap<String, RateLimitConfig>,
    table: Mutex<Table>,
    cleanup_interval: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(
            DEFAULT_LIMITS
                .iter()
                .map(|(name, config)| (name.to_string(), *config)),
        )
    }

    pub fn with_limits(limits: impl IntoIterator<Item = (String, RateLimitConfig)>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
            table: Mutex::new(Table {
                entries: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
            cleanup_interval: CLEANUP_INTERVAL,
        }
    }

    /// Unknown actions fall back to the global config.
    fn config_for(&self, action: &str) -> RateLimitConfig {
        self.limits
            .get(action)
            .or_else(|| self.limits.get(ACTION_GLOBAL))
            .copied()
            .unwrap_or(RateLimitConfig::new(Duration::from_secs(60), 100))
    }

    fn key(identifier: &str, action: &str) -> String {
        format!("{action}:{identifier}")
    }

    fn reset_in(reset_at: Instant, now: Instant) -> u64 {
        let remaining = reset_at.saturating_duration_since(now);
        remaining.as_secs_f64().ceil() as u64
    }

    fn cleanup(table: &mut Table, interval: Duration, now: Instant) {
        if now.duration_since(table.last_cleanup) < interval {
            return;
        }
        table.last_cleanup = now;
        table.entries.retain(|_, entry| entry.reset_at > now);
    }

    /// Counts the request against the window. Use [`RateLimiter::peek`] when
    /// the request must not be counted.
    pub fn check_and_increment(&self, identifier: &str, action: &str) -> Decision {
        let config = self.config_for(action);
        let key = Self::key(identifier, action);
        let now = Instant::now();

        let mut table = self.table.lock();
        Self::cleanup(&mut table, self.cleanup_interval, now);

        let entry = table.entries.get_mut(&key);
        match entry {
            Some(entry) if entry.reset_at > now => {
                if entry.count >= config.max_requests {
                    return Decision {
                        success: false,
                        remaining: 0,
                        reset_in: Self::reset_in(entry.reset_at, now),
                        limit: config.max_requests,
                    };
                }
                entry.count += 1;
                Decision {
                    success: true,
                    remaining: config.max_requests - entry.count,
                    reset_in: Self::reset_in(entry.reset_at, now),
                    limit: config.max_requests,
                }
            }
            _ => {
                let reset_at = now + config.window;
                table.entries.insert(key, Entry { count: 1, reset_at });
                Decision {
                    success: true,
                    remaining: config.max_requests - 1,
                    reset_in: config.window.as_secs(),
                    limit: config.max_requests,
                }
            }
        }
    }

    /// Non-mutating status read, for attaching response headers without
    /// double-counting the request.
    pub fn peek(&self, identifier: &str, action: &str) -> Decision {
        let config = self.config_for(action);
        let key = Self::key(identifier, action);
        let now = Instant::now();

        let table = self.table.lock();
        match table.entries.get(&key) {
            Some(entry) if entry.reset_at > now => Decision {
                success: entry.count < config.max_requests,
                remaining: config.max_requests.saturating_sub(entry.count),
                reset_in: Self::reset_in(entry.reset_at, now),
                limit: config.max_requests,
            },
            _ => Decision {
                success: true,
                remaining: config.max_requests,
                reset_in: config.window.as_secs(),
                limit: config.max_requests,
            },
        }
    }

    /// Clears one window. Used by tests and admin overrides.
    pub fn reset(&self, identifier: &str, action: &str) {
        self.table.lock().entries.remove(&Self::key(identifier, action));
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.table.lock().entries.len()
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
    use std::thread::sleep;

    fn limiter(window: Duration, max: u32) -> RateLimiter {
        RateLimiter::with_limits([
            ("test".to_string(), RateLimitConfig::new(window, max)),
            (
                ACTION_GLOBAL.to_string(),
                RateLimitConfig::new(Duration::from_secs(60), 100),
            ),
        ])
    }

    #[test]
    fn fresh_window_counts_from_one() {
        let limiter = limiter(Duration::from_secs(60), 3);
        let decision = limiter.check_and_increment("u1", "test");
        assert!(decision.success);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.limit, 3);
    }

    #[test]
    fn limit_plus_one_fails_with_zero_remaining() {
        let limiter = limiter(Duration::from_secs(60), 3);
        for _ in 0..3 {
            assert!(limiter.check_and_increment("u1", "test").success);
        }
        let denied = limiter.check_and_increment("u1", "test");
        assert!(!denied.success);
        assert_eq!(denied.remaining, 0);
        assert!(denied.reset_in > 0);

        // other identifiers are unaffected
        assert!(limiter.check_and_increment("u2", "test").success);
    }

    #[test]
    fn window_expiry_resets_counter() {
        let limiter = limiter(Duration::from_millis(40), 1);
        assert!(limiter.check_and_increment("u1", "test").success);
        assert!(!limiter.check_and_increment("u1", "test").success);

        sleep(Duration::from_millis(50));
        let fresh = limiter.check_and_increment("u1", "test");
        assert!(fresh.success);
        assert_eq!(fresh.remaining, 0);
    }

    #[test]
    fn peek_does_not_count() {
        let limiter = limiter(Duration::from_secs(60), 2);
        limiter.check_and_increment("u1", "test");
        for _ in 0..10 {
            let status = limiter.peek("u1", "test");
            assert!(status.success);
            assert_eq!(status.remaining, 1);
        }
        assert!(limiter.check_and_increment("u1", "test").success);
    }

    #[test]
    fn unknown_action_falls_back_to_global() {
        let limiter = limiter(Duration::from_secs(60), 2);
        let decision = limiter.check_and_increment("u1", "mystery");
        assert_eq!(decision.limit, 100);
    }

    #[test]
    fn reset_clears_window() {
        let limiter = limiter(Duration::from_secs(60), 1);
        assert!(limiter.check_and_increment("u1", "test").success);
        assert!(!limiter.check_and_increment("u1", "test").success);
        limiter.reset("u1", "test");
        assert!(limiter.check_and_increment("u1", "test").success);
    }

    #[test]
    fn lazy_cleanup_drops_expired_entries() {
        let mut limiter = limiter(Duration::from_millis(10), 1);
        limiter.cleanup_interval = Duration::from_millis(20);
        limiter.check_and_increment("u1", "test");
        limiter.check_and_increment("u2", "test");
        assert_eq!(limiter.entry_count(), 2);

        sleep(Duration::from_millis(30));
        limiter.check_and_increment("u3", "test");
        assert_eq!(limiter.entry_count(), 1);
    }
}
