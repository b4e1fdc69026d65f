//! Process-wide cache and limiter, built once at startup.
//!
//! Request handling borrows or clones the pieces it needs; nothing here is a
//! global.

use crate::error::Result;
use licita_cache::{CacheConfig, Sweeper, TaggedCache, with_cache};
use licita_config::{Settings, Validate};
use licita_core::HandlerFn;
use licita_log::info;
use licita_ratelimit::{FixedWindowLimiter, RateLimitConfig, RateLimitMiddleware};
use std::sync::Arc;
use std::time::Duration;

/// Cache configuration matching the `cache` section of `settings`.
pub fn cache_config(settings: &Settings) -> CacheConfig {
    let mut config = CacheConfig::new()
        .with_default_ttl(settings.cache.default_ttl())
        .with_sweep_interval(settings.cache.sweep_interval());
    if let Some(prefix) = &settings.cache.key_prefix {
        config = config.with_key_prefix(prefix.clone());
    }
    config
}

/// Rate limit configuration matching the `rate_limit` section of `settings`.
pub fn rate_limit_config(settings: &Settings) -> RateLimitConfig {
    RateLimitConfig::new(settings.rate_limit.default_limit, settings.rate_limit.window())
}

/// Shared cache, limiter and sweeper.
#[derive(Debug)]
pub struct Infrastructure {
    settings: Settings,
    cache: TaggedCache,
    limiter: Arc<FixedWindowLimiter>,
    sweeper: Option<Sweeper>,
}

impl Infrastructure {
    /// Validate `settings` and build the cache and limiter. No task is
    /// spawned; call [`start_sweeper`](Self::start_sweeper) from a runtime.
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let cache_config = cache_config(&settings);
        cache_config.validate()?;
        let limiter = rate_limit_config(&settings).build_limiter()?;

        Ok(Self {
            cache: TaggedCache::with_config(cache_config),
            limiter: Arc::new(limiter),
            sweeper: None,
            settings,
        })
    }

    /// Build from settings and start the sweeper.
    pub fn start(settings: Settings) -> Result<Self> {
        let mut infra = Self::new(settings)?;
        infra.start_sweeper()?;
        Ok(infra)
    }

    /// Load settings from `.env` and `LICITA_*` variables, then [`start`](Self::start).
    pub fn from_env() -> Result<Self> {
        licita_log::init();
        Self::start(Settings::from_env()?)
    }

    /// Spawn the expiry sweeper if it is not already running.
    pub fn start_sweeper(&mut self) -> Result<()> {
        if self.sweeper.is_none() {
            let interval = self.settings.cache.sweep_interval();
            info!("Starting cache sweeper every {:?}", interval);
            self.sweeper = Some(self.cache.spawn_sweeper(interval)?);
        }
        Ok(())
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(|s| !s.is_finished())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &TaggedCache {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.limiter
    }

    /// Rate-limit middleware on the shared limiter with the default budget.
    pub fn rate_limiter(&self) -> RateLimitMiddleware {
        self.rate_limiter_with(self.settings.rate_limit.default_limit)
    }

    /// Rate-limit middleware on the shared limiter with its own budget.
    pub fn rate_limiter_with(&self, limit: u64) -> RateLimitMiddleware {
        RateLimitMiddleware::shared(self.limiter.clone(), limit)
    }

    /// Cache `handler`'s `GET` responses in the shared cache.
    pub fn cached(&self, ttl: Duration, tags: &[&str], handler: HandlerFn) -> HandlerFn {
        with_cache(self.cache.clone(), ttl, tags, handler)
    }

    /// Stop the sweeper. The cache and limiter stay usable.
    pub fn shutdown(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop();
            info!("Cache sweeper stopped");
        }
    }
}
