//! Fixed-window rate limiting for the Licita CRM
//!
//! Requests are counted per client identifier in windows that open on the
//! first request and last a fixed interval. State is process-local.
//!
//! ## Quick Start
//!
//! ```rust
//! use licita_core::{handler_fn, HttpRequest, HttpResponse};
//! use licita_ratelimit::{with_preset, Preset};
//!
//! # tokio_test::block_on(async {
//! let login = with_preset(Preset::Auth, handler_fn(|_req| async { Ok(HttpResponse::ok()) }))
//!     .unwrap();
//!
//! let response = login(HttpRequest::post("/api/auth/login")).await.unwrap();
//! assert_eq!(response.header("X-RateLimit-Remaining"), Some("4"));
//! # });
//! ```
//!
//! ## Response Headers
//!
//! - `X-RateLimit-Limit`: requests allowed per window
//! - `X-RateLimit-Remaining`: requests left in the current window
//! - `X-RateLimit-Reset`: Unix timestamp (milliseconds) when the window resets
//! - `Retry-After`: seconds to wait, on 429 responses only

pub mod config;
pub mod error;
pub mod extractor;
pub mod limiter;
pub mod middleware;

pub use config::{DEFAULT_ERROR_MESSAGE, Preset, RateLimitConfig};
pub use error::{RateLimitError, RateLimitHeaders, RateLimitResult};
pub use extractor::{ANONYMOUS, KeyExtractor, client_identifier, client_ip};
pub use limiter::{FixedWindowLimiter, RateLimitInfo};
pub use middleware::{RateLimitMiddleware, TooManyRequestsBody, with_preset, with_rate_limit};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::{Preset, RateLimitConfig};
    pub use crate::error::{RateLimitError, RateLimitResult};
    pub use crate::extractor::KeyExtractor;
    pub use crate::limiter::{FixedWindowLimiter, RateLimitInfo};
    pub use crate::middleware::{RateLimitMiddleware, with_preset, with_rate_limit};
}
