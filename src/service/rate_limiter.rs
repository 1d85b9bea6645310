use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::config::RateLimitConfig;

/// Per-identifier request gate consulted before any payment work.
pub trait RateLimiter: Send + Sync {
    fn is_allowed(&self, identifier: &str) -> bool;
    fn remaining_block_time(&self, identifier: &str) -> Duration;
}

#[derive(Debug, Default)]
struct RateLimitRecord {
    request_timestamps: VecDeque<Instant>,
    blocked_until: Option<Instant>,
}

impl RateLimitRecord {
    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        let blocked = self.blocked_until.is_some_and(|until| now < until);
        let recent = self
            .request_timestamps
            .back()
            .is_some_and(|&last| now.saturating_duration_since(last) < window);
        !blocked && !recent
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    records: HashMap<String, RateLimitRecord>,
    last_sweep: Option<Instant>,
}

impl LimiterState {
    /// Drops records that would start from scratch on their next check.
    /// Runs at most once per window.
    fn sweep(&mut self, now: Instant, window: Duration) {
        let due = self
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= window);
        if !due {
            return;
        }
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_idle(now, window));
        self.last_sweep = Some(now);

        let dropped = before - self.records.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.records.len(), "Swept idle rate limit records");
        }
    }
}

/// Process-local sliding window limiter.
///
/// Exceeding the window blocks the identifier for a full window; when the
/// block lapses the window starts empty. State is per instance and lost on
/// restart. Idle identifiers are swept on access, so memory tracks the
/// number of recently active identifiers rather than every one ever seen.
pub struct SlidingWindowRateLimiter {
    window: Duration,
    max_requests: usize,
    state: Mutex<LimiterState>,
}

impl SlidingWindowRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_requests)
    }

    fn check_at(&self, identifier: &str, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sweep(now, self.window);
        let record = state.records.entry(identifier.to_string()).or_default();

        if let Some(until) = record.blocked_until {
            if now < until {
                return false;
            }
            record.blocked_until = None;
            record.request_timestamps.clear();
        }

        while let Some(&oldest) = record.request_timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                record.request_timestamps.pop_front();
            } else {
                break;
            }
        }

        if record.request_timestamps.len() >= self.max_requests {
            record.blocked_until = Some(now + self.window);
            tracing::warn!(
                identifier,
                window_secs = self.window.as_secs(),
                "Rate limit exceeded, blocking identifier"
            );
            return false;
        }

        record.request_timestamps.push_back(now);
        true
    }

    fn remaining_at(&self, identifier: &str, now: Instant) -> Duration {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .records
            .get(identifier)
            .and_then(|record| record.blocked_until)
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or_default()
    }
}

impl RateLimiter for SlidingWindowRateLimiter {
    fn is_allowed(&self, identifier: &str) -> bool {
        self.check_at(identifier, Instant::now())
    }

    fn remaining_block_time(&self, identifier: &str) -> Duration {
        self.remaining_at(identifier, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn rejects_request_after_limit_within_window() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 3);
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.check_at("user-1", start + Duration::from_secs(i)));
        }
        assert!(!limiter.check_at("user-1", start + Duration::from_secs(10)));
        assert_eq!(
            limiter.remaining_at("user-1", start + Duration::from_secs(10)),
            WINDOW
        );
    }

    #[test]
    fn block_holds_even_after_old_timestamps_age_out() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 2);
        let start = Instant::now();

        assert!(limiter.check_at("u", start));
        assert!(limiter.check_at("u", start + Duration::from_secs(1)));
        assert!(!limiter.check_at("u", start + Duration::from_secs(2)));

        // A plain sliding window would release a slot here.
        assert!(!limiter.check_at("u", start + Duration::from_secs(61)));
        assert_eq!(
            limiter.remaining_at("u", start + Duration::from_secs(32)),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn window_resets_fully_after_block_lapses() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 2);
        let start = Instant::now();

        assert!(limiter.check_at("u", start));
        assert!(limiter.check_at("u", start));
        assert!(!limiter.check_at("u", start));

        let after_block = start + WINDOW;
        assert!(limiter.check_at("u", after_block));
        assert!(limiter.check_at("u", after_block));
        assert!(!limiter.check_at("u", after_block));
    }

    #[test]
    fn old_requests_slide_out_of_window() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 2);
        let start = Instant::now();

        assert!(limiter.check_at("u", start));
        assert!(limiter.check_at("u", start + Duration::from_secs(30)));
        assert!(limiter.check_at("u", start + Duration::from_secs(60)));
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 1);
        let now = Instant::now();

        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
        assert_eq!(limiter.remaining_at("b", now), Duration::ZERO);
    }

    fn tracked(limiter: &SlidingWindowRateLimiter) -> usize {
        limiter.state.lock().unwrap().records.len()
    }

    #[test]
    fn idle_identifiers_are_dropped() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 5);
        let start = Instant::now();

        for i in 0..10_000 {
            assert!(limiter.check_at(&format!("user-{}", i), start));
        }
        assert_eq!(tracked(&limiter), 10_000);

        assert!(limiter.check_at("late", start + Duration::from_secs(3600)));
        assert_eq!(tracked(&limiter), 1);
    }

    #[test]
    fn sweep_keeps_blocked_and_recent_identifiers() {
        let limiter = SlidingWindowRateLimiter::new(WINDOW, 1);
        let start = Instant::now();

        assert!(limiter.check_at("stale", start));
        assert!(limiter.check_at("blocked", start + Duration::from_secs(40)));
        assert!(!limiter.check_at("blocked", start + Duration::from_secs(40)));
        assert!(limiter.check_at("recent", start + Duration::from_secs(50)));

        assert!(limiter.check_at("other", start + Duration::from_secs(90)));
        assert_eq!(tracked(&limiter), 3);
        assert!(!limiter.check_at("blocked", start + Duration::from_secs(90)));
        assert_eq!(
            limiter.remaining_at("blocked", start + Duration::from_secs(90)),
            Duration::from_secs(10)
        );
    }
}
