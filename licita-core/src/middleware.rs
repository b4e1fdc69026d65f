// Middleware composition for request handlers

use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use licita_log::{debug, trace};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by handlers.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, Error>> + Send>>;

/// The rest of the chain, consumed by a middleware to forward the request.
pub type Next = Box<dyn FnOnce(HttpRequest) -> BoxFuture + Send>;

/// A route handler.
pub type HandlerFn = Arc<dyn Fn(HttpRequest) -> BoxFuture + Send + Sync>;

/// Build a [`HandlerFn`] from an async closure.
///
/// ```
/// use licita_core::{handler_fn, HttpResponse};
///
/// let handler = handler_fn(|_req| async { Ok(HttpResponse::ok()) });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, Error>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Processes a request before and/or after the handler.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error>;
}

/// Wrap a single handler with a middleware, yielding a new handler.
///
/// This is the higher-order form of [`MiddlewareChain`]: `wrap(m, h)` behaves
/// like a chain containing only `m` in front of `h`.
pub fn wrap<M: Middleware + 'static>(middleware: Arc<M>, handler: HandlerFn) -> HandlerFn {
    Arc::new(move |req| {
        let middleware = middleware.clone();
        let handler = handler.clone();
        Box::pin(async move {
            middleware
                .handle(req, Box::new(move |req| handler(req)))
                .await
        })
    })
}

/// Ordered list of middleware applied in front of a handler.
#[derive(Clone)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Append a middleware; it runs after the ones already added.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.use_shared(Arc::new(middleware));
    }

    /// Append a middleware that is also held elsewhere.
    pub fn use_shared(&mut self, middleware: Arc<dyn Middleware>) {
        let mut mws = (*self.middlewares).clone();
        mws.push(middleware);
        self.middlewares = Arc::new(mws);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run the request through every middleware and then `handler`.
    pub async fn apply(&self, req: HttpRequest, handler: HandlerFn) -> Result<HttpResponse, Error> {
        debug!(
            "Executing middleware chain: {} middleware, {} {}",
            self.middlewares.len(),
            req.method,
            req.path
        );
        self.execute_from(0, req, handler).await
    }

    /// Turn the chain plus `handler` into a single handler.
    pub fn into_handler(self, handler: HandlerFn) -> HandlerFn {
        Arc::new(move |req| {
            let chain = self.clone();
            let handler = handler.clone();
            Box::pin(async move { chain.apply(req, handler).await })
        })
    }

    fn execute_from(&self, index: usize, req: HttpRequest, handler: HandlerFn) -> BoxFuture {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, calling handler");
            handler(req)
        } else {
            let middleware = self.middlewares[index].clone();
            let chain = self.clone();

            trace!("Executing middleware {}", index);
            Box::pin(async move {
                middleware
                    .handle(
                        req,
                        Box::new(move |req| chain.execute_from(index + 1, req, handler)),
                    )
                    .await
            })
        }
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}
