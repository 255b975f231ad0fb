//! Multi-window rate limiting
//!
//! Token bucket per key with three overlapping windows (minute, hour,
//! day). A request must clear ALL three: a full per-minute bucket does
//! not help once the daily cap is gone. Buckets refill continuously,
//! proportional to elapsed wall-clock time.

use dashmap::DashMap;
use dm_assistant_config::RateLimitConfig;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
}

impl Bucket {
    fn new(capacity: f64, window_secs: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: capacity / window_secs,
        }
    }

    fn refill(&mut self, elapsed_secs: f64) {
        self.tokens = (self.tokens + elapsed_secs * self.refill_per_sec).min(self.capacity);
    }
}

struct KeyState {
    minute: Bucket,
    hour: Bucket,
    day: Bucket,
    last_refill: Instant,
}

impl KeyState {
    fn new(config: &RateLimitConfig) -> Self {
        Self {
            minute: Bucket::new(config.per_minute, 60.0),
            hour: Bucket::new(config.per_hour, 3600.0),
            day: Bucket::new(config.per_day, 86400.0),
            last_refill: Instant::now(),
        }
    }

    fn refill_all(&mut self) {
        let elapsed = self.last_refill.elapsed().as_secs_f64();
        self.minute.refill(elapsed);
        self.hour.refill(elapsed);
        self.day.refill(elapsed);
        self.last_refill = Instant::now();
    }
}

/// Outcome of a limit check
#[derive(Debug, Clone, PartialEq)]
pub enum LimitDecision {
    Allowed,
    Denied { reason: String },
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allowed)
    }
}

/// Current bucket levels for one key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemainingTokens {
    pub minute: f64,
    pub hour: f64,
    pub day: f64,
}

/// Per-key three-window token-bucket limiter. Keys are creator or
/// follower identifiers; state is created lazily per key.
pub struct RateLimiter {
    config: RateLimitConfig,
    keys: DashMap<String, KeyState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            keys: DashMap::new(),
        }
    }

    /// Refill, then require every window to hold `cost` tokens. Windows
    /// are checked minute, hour, day, short-circuiting on the first
    /// failure. Tokens are deducted from all three only on success.
    pub fn check_limit(&self, key: &str, cost: f64) -> LimitDecision {
        let mut state = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| KeyState::new(&self.config));
        state.refill_all();

        let windows = [
            ("per-minute", state.minute.tokens, self.config.per_minute),
            ("per-hour", state.hour.tokens, self.config.per_hour),
            ("per-day", state.day.tokens, self.config.per_day),
        ];
        for (window, available, capacity) in windows {
            if available < cost {
                let reason = format!(
                    "{window} limit reached ({available:.1}/{capacity:.0} tokens, need {cost:.0})"
                );
                tracing::debug!(key, %reason, "rate limit denied");
                return LimitDecision::Denied { reason };
            }
        }

        state.minute.tokens -= cost;
        state.hour.tokens -= cost;
        state.day.tokens -= cost;
        LimitDecision::Allowed
    }

    /// Current levels after refill, without consuming anything
    pub fn get_remaining(&self, key: &str) -> RemainingTokens {
        let mut state = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| KeyState::new(&self.config));
        state.refill_all();
        RemainingTokens {
            minute: state.minute.tokens,
            hour: state.hour.tokens,
            day: state.day.tokens,
        }
    }

    /// Drop all state for a key
    pub fn reset(&self, key: &str) {
        self.keys.remove(key);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RateLimitConfig {
        RateLimitConfig {
            per_minute: 2.0,
            per_hour: 5.0,
            per_day: 10.0,
        }
    }

    #[test]
    fn test_allows_until_minute_bucket_empty() {
        let limiter = RateLimiter::new(small_config());
        assert!(limiter.check_limit("f1", 1.0).is_allowed());
        assert!(limiter.check_limit("f1", 1.0).is_allowed());
        let denied = limiter.check_limit("f1", 1.0);
        match denied {
            LimitDecision::Denied { reason } => assert!(reason.contains("per-minute")),
            LimitDecision::Allowed => panic!("third request should be denied"),
        }
    }

    #[test]
    fn test_deduction_hits_all_windows() {
        let limiter = RateLimiter::new(small_config());
        assert!(limiter.check_limit("f1", 1.0).is_allowed());
        let remaining = limiter.get_remaining("f1");
        // Immediately after the check, refill is negligible
        assert!((remaining.minute - 1.0).abs() < 0.01);
        assert!((remaining.hour - 4.0).abs() < 0.01);
        assert!((remaining.day - 9.0).abs() < 0.01);
    }

    #[test]
    fn test_denied_request_consumes_nothing() {
        let limiter = RateLimiter::new(small_config());
        assert!(!limiter.check_limit("f1", 100.0).is_allowed());
        let remaining = limiter.get_remaining("f1");
        assert!((remaining.day - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(small_config());
        assert!(limiter.check_limit("f1", 2.0).is_allowed());
        assert!(limiter.check_limit("f2", 2.0).is_allowed());
    }

    #[test]
    fn test_reset_restores_capacity() {
        let limiter = RateLimiter::new(small_config());
        assert!(limiter.check_limit("f1", 2.0).is_allowed());
        limiter.reset("f1");
        assert!(limiter.check_limit("f1", 2.0).is_allowed());
    }

    #[test]
    fn test_daily_cap_blocks_despite_fresh_minute_bucket() {
        let config = RateLimitConfig {
            per_minute: 100.0,
            per_hour: 100.0,
            per_day: 3.0,
        };
        let limiter = RateLimiter::new(config);
        assert!(limiter.check_limit("f1", 3.0).is_allowed());
        let denied = limiter.check_limit("f1", 1.0);
        match denied {
            LimitDecision::Denied { reason } => assert!(reason.contains("per-day")),
            LimitDecision::Allowed => panic!("daily cap should block"),
        }
    }
}
