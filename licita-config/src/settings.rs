// Typed settings for the cache and the rate limiter

use crate::env::EnvLoader;
use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, Result};
use licita_log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment variable read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "LICITA";

/// Cache section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL used when a caller does not pass one (5 minutes)
    pub default_ttl_ms: u64,
    /// Period of the background expiry sweep (1 minute)
    pub sweep_interval_ms: u64,
    /// Optional namespace prepended to every key
    pub key_prefix: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60 * 1000,
            sweep_interval_ms: 60 * 1000,
            key_prefix: None,
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

/// Rate limiter section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Length of each fixed window (1 minute)
    pub window_ms: u64,
    /// Requests per window for routes without a preset
    pub default_limit: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: 60 * 1000,
            default_limit: 100,
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// All infrastructure settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::positive(self.cache.sweep_interval_ms, "cache.sweep_interval_ms")?;
        ConfigValidator::positive(self.rate_limit.window_ms, "rate_limit.window_ms")?;
        ConfigValidator::positive(self.rate_limit.default_limit, "rate_limit.default_limit")?;
        if let Some(prefix) = &self.cache.key_prefix {
            ConfigValidator::not_empty(prefix, "cache.key_prefix")?;
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match vars.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            }),
    }
}

impl Settings {
    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// ```
    /// use licita_config::Settings;
    ///
    /// let settings = Settings::from_toml_str("[rate_limit]\ndefault_limit = 10\n").unwrap();
    /// assert_eq!(settings.rate_limit.default_limit, 10);
    /// assert_eq!(settings.cache.default_ttl_ms, 300_000);
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Read `.env` (if present) and `LICITA_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let vars = EnvLoader::with_prefix(ENV_PREFIX).load();
        let settings = Self::from_vars(&vars)?;
        info!(
            "Settings loaded: cache ttl {}ms, sweep {}ms, rate limit {}/{}ms",
            settings.cache.default_ttl_ms,
            settings.cache.sweep_interval_ms,
            settings.rate_limit.default_limit,
            settings.rate_limit.window_ms
        );
        Ok(settings)
    }

    /// Overlay prefix-stripped variables (see [`EnvLoader`]) on the defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(v) = parse_var(vars, "cache_default_ttl_ms")? {
            settings.cache.default_ttl_ms = v;
        }
        if let Some(v) = parse_var(vars, "cache_sweep_interval_ms")? {
            settings.cache.sweep_interval_ms = v;
        }
        if let Some(v) = vars.get("cache_key_prefix") {
            settings.cache.key_prefix = Some(v.clone());
        }
        if let Some(v) = parse_var(vars, "rate_limit_window_ms")? {
            settings.rate_limit.window_ms = v;
        }
        if let Some(v) = parse_var(vars, "rate_limit_default_limit")? {
            settings.rate_limit.default_limit = v;
        }

        settings.validate()?;
        Ok(settings)
    }
}
