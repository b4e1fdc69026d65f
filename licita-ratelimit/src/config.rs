//! Rate limit configuration and route presets

use crate::error::{RateLimitError, RateLimitResult};
use crate::extractor::KeyExtractor;
use crate::limiter::FixedWindowLimiter;
use std::time::Duration;

/// Default message in 429 bodies.
pub const DEFAULT_ERROR_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Budget and behaviour for one rate-limited route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u64,
    /// Window duration
    pub window: Duration,
    /// How requests are grouped
    pub key_extractor: KeyExtractor,
    /// Add `X-RateLimit-*` headers to allowed responses
    pub include_headers: bool,
    /// `message` field of the 429 body
    pub error_message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimitConfig {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            key_extractor: KeyExtractor::default(),
            include_headers: true,
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn with_extractor(mut self, extractor: KeyExtractor) -> Self {
        self.key_extractor = extractor;
        self
    }

    pub fn with_headers(mut self, include: bool) -> Self {
        self.include_headers = include;
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn validate(&self) -> RateLimitResult<()> {
        if self.limit == 0 {
            return Err(RateLimitError::config("Limit must be greater than 0"));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::config("Window must be non-zero"));
        }
        Ok(())
    }

    /// Validate and create a limiter with this window.
    pub fn build_limiter(&self) -> RateLimitResult<FixedWindowLimiter> {
        self.validate()?;
        FixedWindowLimiter::new(self.window)
    }
}

/// Budgets for the CRM's route families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Login and password flows: 5 per 15 minutes
    Auth,
    /// General API: 100 per minute
    Api,
    /// File uploads: 10 per minute
    Upload,
    /// Search: 50 per minute
    Search,
    /// Reports, exports and other expensive operations: 5 per minute
    Heavy,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Auth,
        Preset::Api,
        Preset::Upload,
        Preset::Search,
        Preset::Heavy,
    ];

    pub fn limit(&self) -> u64 {
        match self {
            Preset::Auth => 5,
            Preset::Api => 100,
            Preset::Upload => 10,
            Preset::Search => 50,
            Preset::Heavy => 5,
        }
    }

    pub fn window(&self) -> Duration {
        match self {
            Preset::Auth => Duration::from_secs(15 * 60),
            _ => Duration::from_secs(60),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Auth => "auth",
            Preset::Api => "api",
            Preset::Upload => "upload",
            Preset::Search => "search",
            Preset::Heavy => "heavy",
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.limit(), self.window())
    }
}

impl std::str::FromStr for Preset {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RateLimitError::config(format!("Unknown rate limit preset: {}", s)))
    }
}
