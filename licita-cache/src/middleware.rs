//! Response caching for `GET` handlers.

use crate::keys::api_key;
use crate::store::TaggedCache;
use async_trait::async_trait;
use licita_core::{Error, HandlerFn, HttpRequest, HttpResponse, Middleware, Next, wrap};
use licita_log::debug;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Header reporting whether the response came from the cache.
pub const CACHE_STATUS_HEADER: &str = "X-Cache";

/// Derives the cache key for a request.
pub type CacheKeyFn = Arc<dyn Fn(&HttpRequest) -> String + Send + Sync>;

/// Default key: the request path plus its query parameters sorted by name.
pub fn request_key(req: &HttpRequest) -> String {
    if req.query_params.is_empty() {
        return api_key(&req.path, None);
    }
    let params: Vec<(&str, &str)> = req
        .query_params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    api_key(&req.path, Some(&params))
}

/// Serves `GET` responses from a [`TaggedCache`].
///
/// On a hit the cached JSON is returned with `X-Cache: HIT`. On a miss the
/// handler runs; a 2xx JSON response is stored and returned with
/// `X-Cache: MISS`. Anything else passes through unchanged.
pub struct CacheMiddleware {
    cache: TaggedCache<Value>,
    key_fn: CacheKeyFn,
    ttl: Duration,
    tags: Vec<String>,
}

impl CacheMiddleware {
    pub fn new(cache: TaggedCache<Value>) -> Self {
        let ttl = cache.config().default_ttl;
        Self {
            cache,
            key_fn: Arc::new(request_key),
            ttl,
            tags: Vec::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&HttpRequest) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        if !req.is_get() {
            return next(req).await;
        }

        let key = (self.key_fn)(&req);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Response cache hit: {}", key);
            return Ok(HttpResponse::json(&cached)?.with_header(CACHE_STATUS_HEADER, "HIT"));
        }

        let response = next(req).await?;
        if !response.is_success() {
            return Ok(response);
        }

        match response.body_json::<Value>() {
            Ok(body) => {
                let tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
                self.cache.set(&key, body, self.ttl, &tags);
                Ok(response.with_header(CACHE_STATUS_HEADER, "MISS"))
            }
            Err(_) => {
                debug!("Response for {} is not JSON, not caching", key);
                Ok(response)
            }
        }
    }
}

/// Wrap `handler` so its `GET` responses are cached under the default
/// request key for `ttl` with `tags`.
pub fn with_cache(
    cache: TaggedCache<Value>,
    ttl: Duration,
    tags: &[&str],
    handler: HandlerFn,
) -> HandlerFn {
    let middleware = CacheMiddleware::new(cache)
        .with_ttl(ttl)
        .with_tags(tags.iter().copied());
    wrap(Arc::new(middleware), handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use licita_core::handler_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(calls: Arc<AtomicUsize>, status: u16) -> HandlerFn {
        handler_fn(move |_req| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                let mut response = HttpResponse::json(&json!({ "call": n }))?;
                response.status = status;
                Ok::<_, Error>(response)
            }
        })
    }

    #[test]
    fn test_request_key_sorts_query() {
        let req = HttpRequest::get("/api/clientes")
            .with_query("page", "2")
            .with_query("limit", "10");
        assert_eq!(request_key(&req), "api:/api/clientes-limit:10,page:2");
        assert_eq!(request_key(&HttpRequest::get("/x")), "api:/x");
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = TaggedCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = with_cache(
            cache.clone(),
            Duration::from_secs(60),
            &["clientes"],
            counting_handler(calls.clone(), 200),
        );

        let first = handler(HttpRequest::get("/api/clientes")).await.unwrap();
        assert_eq!(first.header("X-Cache"), Some("MISS"));

        let second = handler(HttpRequest::get("/api/clientes")).await.unwrap();
        assert_eq!(second.header("X-Cache"), Some("HIT"));
        assert_eq!(second.body_json::<Value>().unwrap(), json!({ "call": 1 }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(cache.keys_for_tag("clientes"), vec!["api:/api/clientes"]);
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let cache = TaggedCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = with_cache(
            cache.clone(),
            Duration::from_secs(60),
            &[],
            counting_handler(calls.clone(), 200),
        );

        let response = handler(HttpRequest::post("/api/clientes")).await.unwrap();
        assert_eq!(response.header("X-Cache"), None);
        handler(HttpRequest::post("/api/clientes")).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_error_responses_not_cached() {
        let cache = TaggedCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = with_cache(
            cache.clone(),
            Duration::from_secs(60),
            &[],
            counting_handler(calls.clone(), 500),
        );

        let response = handler(HttpRequest::get("/api/x")).await.unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.header("X-Cache"), None);
        assert_eq!(cache.size(), 0);
    }

    #[tokio::test]
    async fn test_invalidation_forces_recompute() {
        let cache = TaggedCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = with_cache(
            cache.clone(),
            Duration::from_secs(60),
            &["clientes"],
            counting_handler(calls.clone(), 200),
        );

        handler(HttpRequest::get("/api/clientes")).await.unwrap();
        assert_eq!(cache.invalidate_by_tag("clientes"), 1);

        let again = handler(HttpRequest::get("/api/clientes")).await.unwrap();
        assert_eq!(again.header("X-Cache"), Some("MISS"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_custom_key_fn() {
        let cache = TaggedCache::new();
        let middleware = Arc::new(
            CacheMiddleware::new(cache.clone())
                .with_key_fn(|req| format!("route:{}", req.path)),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = wrap(middleware, counting_handler(calls, 200));

        handler(HttpRequest::get("/a").with_query("q", "1")).await.unwrap();
        let hit = handler(HttpRequest::get("/a").with_query("q", "2")).await.unwrap();
        assert_eq!(hit.header("X-Cache"), Some("HIT"));
        assert!(cache.contains_key("route:/a"));
    }
}
