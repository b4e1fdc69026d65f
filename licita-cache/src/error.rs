//! Error types for cache helpers.
//!
//! The store itself never fails: a miss is `None`. Errors only come from
//! typed (JSON) helpers and from configuration validation.

use thiserror::Error;

/// Result type for cache helpers.
pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Value could not be turned into JSON
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cached JSON does not match the requested type
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
