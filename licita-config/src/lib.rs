// Settings for the Licita request-edge infrastructure

pub mod env;
pub mod error;
pub mod settings;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use settings::{CacheSettings, ENV_PREFIX, RateLimitSettings, Settings};
pub use validation::{ConfigValidator, Validate};
