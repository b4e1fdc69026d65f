//! Rate limiting middleware
//!
//! Counts every request against a shared [`FixedWindowLimiter`]. Allowed
//! requests reach the handler and get `X-RateLimit-*` headers; the rest are
//! answered with `429 Too Many Requests`.

use crate::config::{Preset, RateLimitConfig};
use crate::error::{RateLimitError, RateLimitHeaders, RateLimitResult, ceil_secs};
use crate::limiter::FixedWindowLimiter;
use async_trait::async_trait;
use licita_core::{Error, HandlerFn, HttpRequest, HttpResponse, Middleware, Next, wrap};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, trace};

/// JSON body of a 429 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TooManyRequestsBody {
    pub error: String,
    pub message: String,
    /// Seconds until the window resets
    pub retry_after: u64,
}

/// Rate limiting middleware
pub struct RateLimitMiddleware {
    limiter: Arc<FixedWindowLimiter>,
    config: RateLimitConfig,
}

impl RateLimitMiddleware {
    /// Use `limiter` with the budget and options of `config`.
    ///
    /// Windows are counted by the limiter, so `config.window` must equal
    /// its interval.
    pub fn new(limiter: Arc<FixedWindowLimiter>, config: RateLimitConfig) -> RateLimitResult<Self> {
        config.validate()?;
        if config.window != limiter.interval() {
            return Err(RateLimitError::config(format!(
                "window {:?} does not match the limiter interval {:?}",
                config.window,
                limiter.interval()
            )));
        }
        Ok(Self { limiter, config })
    }

    /// Allow `limit` requests per window of a shared `limiter`, with the
    /// default options.
    pub fn shared(limiter: Arc<FixedWindowLimiter>, limit: u64) -> Self {
        let config = RateLimitConfig::new(limit, limiter.interval());
        Self { limiter, config }
    }

    /// Create a middleware with a private limiter.
    pub fn from_config(config: RateLimitConfig) -> RateLimitResult<Self> {
        let limiter = Arc::new(config.build_limiter()?);
        Ok(Self { limiter, config })
    }

    pub fn preset(preset: Preset) -> RateLimitResult<Self> {
        Self::from_config(preset.config())
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn limited_response(&self, error: &RateLimitError) -> Result<HttpResponse, Error> {
        let retry_after = error.retry_after().map(ceil_secs).unwrap_or(0);
        let body = TooManyRequestsBody {
            error: "Too many requests".to_string(),
            message: self.config.error_message.clone(),
            retry_after,
        };

        let headers = error.headers().unwrap_or_else(|| {
            RateLimitHeaders::denied(self.config.limit, 0, retry_after)
        });
        let mut response = HttpResponse::too_many_requests().with_json(&body)?;
        for (name, value) in headers.to_header_pairs() {
            response = response.with_header(name, value);
        }
        Ok(response)
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let key = self.config.key_extractor.extract(&req);

        match self.limiter.check(&key, self.config.limit) {
            Ok(result) => {
                trace!(key = %key, remaining = result.remaining, "Request allowed");
                let mut response = next(req).await?;
                if self.config.include_headers {
                    for (name, value) in result.headers().to_header_pairs() {
                        response = response.with_header(name, value);
                    }
                }
                Ok(response)
            }
            Err(error) => {
                info!(key = %key, retry_after = ?error.retry_after(), "Rate limit exceeded");
                self.limited_response(&error)
            }
        }
    }
}

/// Wrap `handler` with a limiter of its own built from `config`.
pub fn with_rate_limit(config: RateLimitConfig, handler: HandlerFn) -> RateLimitResult<HandlerFn> {
    let middleware = RateLimitMiddleware::from_config(config)?;
    Ok(wrap(Arc::new(middleware), handler))
}

/// Wrap `handler` with a preset budget.
pub fn with_preset(preset: Preset, handler: HandlerFn) -> RateLimitResult<HandlerFn> {
    with_rate_limit(preset.config(), handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use licita_core::handler_fn;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::time::advance;

    fn ok_handler() -> HandlerFn {
        handler_fn(|_req| async { Ok(HttpResponse::ok()) })
    }

    fn from(ip: &str) -> HttpRequest {
        HttpRequest::get("/api/clientes").with_header("x-forwarded-for", ip)
    }

    #[tokio::test(start_paused = true)]
    async fn test_allowed_response_has_headers() {
        let handler =
            with_rate_limit(RateLimitConfig::new(3, Duration::from_secs(60)), ok_handler()).unwrap();

        let response = handler(from("203.0.113.7")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("X-RateLimit-Limit"), Some("3"));
        assert_eq!(response.header("X-RateLimit-Remaining"), Some("2"));
        assert!(response.header("X-RateLimit-Reset").is_some());
        assert_eq!(response.header("Retry-After"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exceeded_returns_429() {
        let handler =
            with_rate_limit(RateLimitConfig::new(1, Duration::from_secs(60)), ok_handler()).unwrap();

        handler(from("203.0.113.7")).await.unwrap();
        advance(Duration::from_millis(30_500)).await;

        let response = handler(from("203.0.113.7")).await.unwrap();
        assert_eq!(response.status, 429);
        assert_eq!(response.header("X-RateLimit-Remaining"), Some("0"));
        assert_eq!(response.header("Retry-After"), Some("30"));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(
            response.body_json::<Value>().unwrap(),
            json!({
                "error": "Too many requests",
                "message": "Rate limit exceeded. Please try again later.",
                "retryAfter": 30
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clients_counted_separately() {
        let handler =
            with_rate_limit(RateLimitConfig::new(1, Duration::from_secs(60)), ok_handler()).unwrap();

        assert_eq!(handler(from("203.0.113.7")).await.unwrap().status, 200);
        assert_eq!(handler(from("203.0.113.8")).await.unwrap().status, 200);
        assert_eq!(handler(from("203.0.113.7")).await.unwrap().status, 429);
    }

    #[tokio::test(start_paused = true)]
    async fn test_headers_can_be_disabled() {
        let config = RateLimitConfig::new(5, Duration::from_secs(60)).with_headers(false);
        let handler = with_rate_limit(config, ok_handler()).unwrap();

        let response = handler(HttpRequest::get("/")).await.unwrap();
        assert_eq!(response.header("X-RateLimit-Limit"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_limiter_across_routes() {
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60)).unwrap());
        let search = wrap(
            Arc::new(RateLimitMiddleware::new(limiter.clone(), RateLimitConfig::new(2, Duration::from_secs(60))).unwrap()),
            ok_handler(),
        );
        let heavy = wrap(
            Arc::new(RateLimitMiddleware::shared(limiter.clone(), 1)),
            ok_handler(),
        );

        assert_eq!(search(from("198.51.100.2")).await.unwrap().status, 200);
        // Same identifier, same window: the stricter route is already spent.
        assert_eq!(heavy(from("198.51.100.2")).await.unwrap().status, 429);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_window_must_match_limiter() {
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60)).unwrap());
        let config = RateLimitConfig::new(5, Duration::from_secs(15 * 60));

        let err = RateLimitMiddleware::new(limiter.clone(), config).err().unwrap();
        assert!(matches!(err, RateLimitError::ConfigError(_)));

        let shared = RateLimitMiddleware::shared(limiter, 5);
        assert_eq!(shared.config().window, Duration::from_secs(60));
        assert_eq!(shared.config().limit, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preset_wrapper() {
        let handler = with_preset(Preset::Heavy, ok_handler()).unwrap();
        for _ in 0..5 {
            assert_eq!(handler(HttpRequest::get("/reports")).await.unwrap().status, 200);
        }
        assert_eq!(handler(HttpRequest::get("/reports")).await.unwrap().status, 429);
    }
}
