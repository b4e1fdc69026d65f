//! Fixed Window Limiter
//!
//! Each identifier gets a window that opens on its first request and lasts
//! `interval`. Every request in the window, allowed or not, bumps the
//! counter; once the counter passes the limit the request is denied until
//! the window elapses.
//!
//! ## Boundary Issue
//!
//! A client can spend its whole limit at the end of one window and again at
//! the start of the next, so up to `2 * limit` requests may land inside one
//! `interval`.
//!
//! ## Example
//!
//! ```rust
//! use licita_ratelimit::FixedWindowLimiter;
//! use std::time::Duration;
//!
//! let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();
//!
//! for _ in 0..5 {
//!     assert!(limiter.check("203.0.113.7", 5).is_ok());
//! }
//! assert!(limiter.check("203.0.113.7", 5).is_err());
//! ```

use crate::error::{RateLimitError, RateLimitHeaders, RateLimitResult};
use dashmap::DashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, trace};

const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Window state for an identifier
#[derive(Debug, Clone)]
struct WindowState {
    /// Requests seen in the current window, rejected ones included
    count: u64,
    /// When the window ends
    reset: Instant,
}

/// Outcome of an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Unix timestamp in milliseconds when the window resets
    pub reset_at: u64,
    /// Time left in the current window
    pub reset_in: Duration,
}

impl RateLimitInfo {
    pub fn headers(&self) -> RateLimitHeaders {
        RateLimitHeaders::allowed(self.limit, self.remaining, self.reset_at)
    }
}

/// Per-identifier fixed window counter.
///
/// The window length belongs to the limiter; the limit is passed on every
/// call so one limiter can serve routes with different budgets.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    interval: Duration,
    windows: DashMap<String, WindowState>,
}

impl FixedWindowLimiter {
    /// Create a limiter whose windows last `interval`.
    pub fn new(interval: Duration) -> RateLimitResult<Self> {
        if interval.is_zero() {
            return Err(RateLimitError::config("Window must be non-zero"));
        }
        debug!(interval = ?interval, "Creating fixed window limiter");
        Ok(Self {
            interval,
            windows: DashMap::new(),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Count a request from `identifier` against `limit`.
    ///
    /// Returns the remaining budget, or [`RateLimitError::LimitExceeded`]
    /// once the count for the current window is above `limit`.
    pub fn check(&self, identifier: &str, limit: u64) -> RateLimitResult<RateLimitInfo> {
        let now = Instant::now();

        // Forget identifiers whose window has elapsed.
        self.windows.retain(|_, window| window.reset >= now);

        let (count, reset) = {
            let mut window = self
                .windows
                .entry(identifier.to_string())
                .or_insert_with(|| WindowState {
                    count: 0,
                    reset: self.window_end(now),
                });
            if window.reset < now {
                window.count = 0;
                window.reset = self.window_end(now);
            }
            window.count += 1;
            (window.count, window.reset)
        };

        let reset_in = reset.saturating_duration_since(now);
        let reset_at = unix_millis().saturating_add(reset_in.as_millis() as u64);

        if count > limit {
            debug!(identifier = %identifier, count, limit, "Fixed window: request denied");
            return Err(RateLimitError::limit_exceeded(limit, reset_at, reset_in));
        }

        trace!(identifier = %identifier, count, limit, "Fixed window: request allowed");
        Ok(RateLimitInfo {
            limit,
            remaining: limit - count,
            reset_at,
            reset_in,
        })
    }

    /// End of a window opened at `now`, capped at thirty years out.
    fn window_end(&self, now: Instant) -> Instant {
        now.checked_add(self.interval)
            .unwrap_or_else(|| now + FAR_FUTURE)
    }

    /// Requests left for `identifier` without counting one.
    pub fn remaining(&self, identifier: &str, limit: u64) -> u64 {
        let now = Instant::now();
        match self.windows.get(identifier) {
            Some(window) if window.reset >= now => limit.saturating_sub(window.count),
            _ => limit,
        }
    }

    /// Drop the window for `identifier`. Returns whether one existed.
    pub fn reset(&self, identifier: &str) -> bool {
        debug!(identifier = %identifier, "Resetting rate limit");
        self.windows.remove(identifier).is_some()
    }

    /// Identifiers currently holding a window, elapsed ones included until
    /// the next `check` prunes them.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[test]
    fn test_zero_interval_rejected() {
        let err = FixedWindowLimiter::new(Duration::ZERO).unwrap_err();
        assert!(matches!(err, RateLimitError::ConfigError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_does_not_overflow() {
        let limiter = FixedWindowLimiter::new(Duration::MAX).unwrap();

        let info = limiter.check("test", 1).unwrap();
        assert_eq!(info.remaining, 0);
        assert!(info.reset_in >= Duration::from_secs(60 * 60 * 24 * 365));

        let err = limiter.check("test", 1).unwrap_err();
        assert!(err.is_limit_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_basic_limit() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();

        for expected in (0..5).rev() {
            let info = limiter.check("test", 5).unwrap();
            assert_eq!(info.remaining, expected);
            assert_eq!(info.limit, 5);
        }

        let err = limiter.check("test", 5).unwrap_err();
        assert!(err.is_limit_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_reset() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(100)).unwrap();

        limiter.check("test", 2).unwrap();
        limiter.check("test", 2).unwrap();
        assert!(limiter.check("test", 2).is_err());

        advance(Duration::from_millis(101)).await;

        let info = limiter.check("test", 2).unwrap();
        assert_eq!(info.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_still_open_at_reset_instant() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(100)).unwrap();
        limiter.check("k", 1).unwrap();

        advance(Duration::from_millis(100)).await;
        assert!(limiter.check("k", 1).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_calls_count() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();
        limiter.check("k", 1).unwrap();
        for _ in 0..3 {
            assert!(limiter.check("k", 1).is_err());
        }
        // A larger limit on the same window sees the rejected calls too.
        let err = limiter.check("k", 4).unwrap_err();
        assert!(err.is_limit_exceeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_tracks_window() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();
        limiter.check("k", 1).unwrap();
        advance(Duration::from_secs(20)).await;

        let err = limiter.check("k", 1).unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(40)));
        assert_eq!(err.headers().unwrap().retry_after, Some(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identifiers_independent() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();
        limiter.check("a", 1).unwrap();
        assert!(limiter.check("a", 1).is_err());
        assert!(limiter.check("b", 1).is_ok());
        assert_eq!(limiter.tracked(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passive_cleanup_and_reset() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(1)).unwrap();
        limiter.check("a", 10).unwrap();
        limiter.check("b", 10).unwrap();
        assert_eq!(limiter.remaining("a", 10), 9);

        assert!(limiter.reset("a"));
        assert!(!limiter.reset("a"));
        assert_eq!(limiter.remaining("a", 10), 10);

        advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.tracked(), 1);
        limiter.check("c", 10).unwrap();
        assert_eq!(limiter.tracked(), 1);
    }
}
