//! Denials and setup failures of the limiter, and the headers that report
//! a client's budget.

use std::time::Duration;
use thiserror::Error;

pub type RateLimitResult<T> = Result<T, RateLimitError>;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The client spent its budget for the current window.
    #[error("Too many requests: {limit} per window, next window in {retry_after:?}")]
    LimitExceeded {
        /// Budget left; 0 for a denial
        remaining: u64,
        limit: u64,
        /// Window end as Unix milliseconds
        reset_at: u64,
        retry_after: Duration,
    },

    /// A limiter or middleware was built with unusable settings.
    #[error("Invalid rate limit settings: {0}")]
    ConfigError(String),
}

impl RateLimitError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::ConfigError(reason.into())
    }

    /// Denial of a request against `limit`; the window ends at `reset_at`
    /// (Unix milliseconds), `retry_after` from now.
    pub fn limit_exceeded(limit: u64, reset_at: u64, retry_after: Duration) -> Self {
        Self::LimitExceeded {
            remaining: 0,
            limit,
            reset_at,
            retry_after,
        }
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. })
    }

    /// Wait before the next window opens. `None` for setup failures.
    pub fn retry_after(&self) -> Option<Duration> {
        if let Self::LimitExceeded { retry_after, .. } = self {
            Some(*retry_after)
        } else {
            None
        }
    }

    /// Headers for the 429 response of a denial.
    pub fn headers(&self) -> Option<RateLimitHeaders> {
        let Self::LimitExceeded {
            limit,
            reset_at,
            retry_after,
            ..
        } = self
        else {
            return None;
        };
        Some(RateLimitHeaders::denied(*limit, *reset_at, ceil_secs(*retry_after)))
    }
}

/// Whole seconds, rounded up.
pub fn ceil_secs(duration: Duration) -> u64 {
    duration.as_millis().div_ceil(1000) as u64
}

/// Budget report attached to responses as `X-RateLimit-Limit`,
/// `X-RateLimit-Remaining` and `X-RateLimit-Reset`, plus `Retry-After` on a
/// denial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u64,
    pub remaining: u64,
    /// Window end as Unix milliseconds
    pub reset: u64,
    /// Whole seconds; set only on denials
    pub retry_after: Option<u64>,
}

impl RateLimitHeaders {
    pub fn allowed(limit: u64, remaining: u64, reset: u64) -> Self {
        Self {
            limit,
            remaining,
            reset,
            retry_after: None,
        }
    }

    pub fn denied(limit: u64, reset: u64, retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::allowed(limit, 0, reset)
        }
    }

    /// Header names and values in response order.
    pub fn to_header_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("X-RateLimit-Limit", Some(self.limit)),
            ("X-RateLimit-Remaining", Some(self.remaining)),
            ("X-RateLimit-Reset", Some(self.reset)),
            ("Retry-After", self.retry_after),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
        .collect()
    }
}
