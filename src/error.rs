//! Startup errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InfraError>;

/// Failure while assembling [`Infrastructure`](crate::Infrastructure).
#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Config(#[from] licita_config::ConfigError),

    #[error(transparent)]
    Cache(#[from] licita_cache::CacheError),

    #[error(transparent)]
    RateLimit(#[from] licita_ratelimit::RateLimitError),
}
