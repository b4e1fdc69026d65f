//! Request/response plumbing shared by the Licita route layer.
//!
//! Route handlers are plain async functions wrapped in [`HandlerFn`]; the
//! cache and rate limiter attach to them as [`Middleware`], either through a
//! [`MiddlewareChain`] or one at a time with [`wrap`].

pub mod error;
pub mod http;
pub mod middleware;

pub use error::{Error, Result};
pub use http::{HttpRequest, HttpResponse};
pub use middleware::{BoxFuture, HandlerFn, Middleware, MiddlewareChain, Next, handler_fn, wrap};
