// Licita - request-edge infrastructure for the Licita CRM
//
// A tagged expiring cache and a fixed-window rate limiter, plus the
// middleware that puts them in front of request handlers.

// Re-export core functionality
pub use licita_core::*;

pub use licita_log;

// Re-export optional crates
#[cfg(feature = "config")]
pub use licita_config;

#[cfg(feature = "cache")]
pub use licita_cache;

#[cfg(feature = "ratelimit")]
pub use licita_ratelimit;

#[cfg(all(feature = "config", feature = "cache", feature = "ratelimit"))]
pub mod error;

#[cfg(all(feature = "config", feature = "cache", feature = "ratelimit"))]
pub mod infrastructure;

#[cfg(all(feature = "config", feature = "cache", feature = "ratelimit"))]
pub use error::InfraError;

#[cfg(all(feature = "config", feature = "cache", feature = "ratelimit"))]
pub use infrastructure::Infrastructure;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Error, HandlerFn, HttpRequest, HttpResponse, Middleware, MiddlewareChain, Next, handler_fn,
        wrap,
    };

    #[cfg(feature = "cache")]
    pub use licita_cache::prelude::*;

    #[cfg(feature = "ratelimit")]
    pub use licita_ratelimit::prelude::*;

    #[cfg(feature = "config")]
    pub use licita_config::Settings;

    #[cfg(all(feature = "config", feature = "cache", feature = "ratelimit"))]
    pub use crate::Infrastructure;
}
