//! Integration tests for licita-ratelimit

use licita_core::{HttpRequest, HttpResponse, MiddlewareChain, handler_fn};
use licita_ratelimit::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

#[tokio::test(start_paused = true)]
async fn test_limit_three_then_window_elapses() {
    let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();

    let remaining: Vec<u64> = (0..3)
        .map(|_| limiter.check("client", 3).unwrap().remaining)
        .collect();
    assert_eq!(remaining, vec![2, 1, 0]);

    match limiter.check("client", 3) {
        Err(RateLimitError::LimitExceeded {
            remaining, limit, ..
        }) => {
            assert_eq!(remaining, 0);
            assert_eq!(limit, 3);
        }
        other => panic!("expected LimitExceeded, got {:?}", other),
    }

    advance(Duration::from_secs(61)).await;
    let info = limiter.check("client", 3).unwrap();
    assert_eq!(info.remaining, 2);
}

#[tokio::test(start_paused = true)]
async fn test_boundary_burst_is_permitted() {
    let limiter = FixedWindowLimiter::new(Duration::from_secs(60)).unwrap();

    // Open the window, then spend the rest right before it closes.
    limiter.check("burst", 5).unwrap();
    advance(Duration::from_secs(59)).await;
    for _ in 0..4 {
        limiter.check("burst", 5).unwrap();
    }

    // Just after the boundary a fresh window grants a full budget again.
    advance(Duration::from_millis(1001)).await;
    for _ in 0..5 {
        limiter.check("burst", 5).unwrap();
    }
    assert!(limiter.check("burst", 5).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_reset_at_moves_with_new_window() {
    let limiter = FixedWindowLimiter::new(Duration::from_secs(10)).unwrap();
    let first = limiter.check("k", 10).unwrap();
    assert_eq!(first.reset_in, Duration::from_secs(10));

    advance(Duration::from_secs(4)).await;
    let second = limiter.check("k", 10).unwrap();
    assert_eq!(second.reset_in, Duration::from_secs(6));

    advance(Duration::from_secs(7)).await;
    let third = limiter.check("k", 10).unwrap();
    assert_eq!(third.reset_in, Duration::from_secs(10));
    assert_eq!(third.remaining, 9);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_checks_never_over_admit() {
    let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60)).unwrap());

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check("shared", 20).is_ok() })
        })
        .collect();

    let mut allowed = 0;
    for task in tasks {
        if task.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 20);
}

#[tokio::test(start_paused = true)]
async fn test_middleware_in_chain() {
    let mut chain = MiddlewareChain::new();
    chain.use_middleware(
        RateLimitMiddleware::from_config(
            RateLimitConfig::new(2, Duration::from_secs(60)).with_extractor(KeyExtractor::header("x-api-key")),
        )
        .unwrap(),
    );
    let handler = chain.into_handler(handler_fn(|_req| async { Ok(HttpResponse::ok()) }));

    let with_key = |key: &str| HttpRequest::get("/api/search").with_header("X-Api-Key", key);

    assert_eq!(handler(with_key("a")).await.unwrap().status, 200);
    assert_eq!(handler(with_key("a")).await.unwrap().status, 200);
    assert_eq!(handler(with_key("a")).await.unwrap().status, 429);
    assert_eq!(handler(with_key("b")).await.unwrap().status, 200);
}

#[tokio::test(start_paused = true)]
async fn test_anonymous_requests_share_a_budget() {
    let handler = with_rate_limit(
        RateLimitConfig::new(1, Duration::from_secs(60)),
        handler_fn(|_req| async { Ok(HttpResponse::ok()) }),
    )
    .unwrap();

    assert_eq!(handler(HttpRequest::get("/")).await.unwrap().status, 200);
    assert_eq!(handler(HttpRequest::get("/")).await.unwrap().status, 429);
}
