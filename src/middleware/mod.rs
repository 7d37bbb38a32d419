//! Middleware pipeline — composable before/after request handler logic.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining middleware chain; call [`Next::run`] to
//!   advance to the next layer.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`from_middleware`] / [`from_fn`] — build handlers from a [`Middleware`] or
//!   from a terminal request handler.
//! - [`LoggerMiddleware`] — request/response logger that reports cache status.
//! - [`PageCacheMiddleware`] — serves and stores whole rendered pages.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Response, context::Context};

pub mod page_cache;

pub use page_cache::{CACHE_STATUS_HEADER, PageCacheMiddleware};

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed on each call to [`run`](Self::run), so it cannot be called
/// more than once per middleware invocation.
pub struct Next {
    middlewares: Vec<MiddlewareHandler>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use rendercache::middleware::{LoggerMiddleware, from_middleware};
///
/// let handler = from_middleware(Arc::new(LoggerMiddleware));
/// ```
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Wraps a terminal request handler as the last entry of a chain.
///
/// The handler never sees [`Next`]; anything after it in the chain is unreachable.
///
/// # Examples
///
/// ```
/// use rendercache::{Method, Request, Response, StatusCode};
/// use rendercache::context::Context;
/// use rendercache::middleware::{Next, from_fn};
///
/// let chain = vec![from_fn(|_ctx: Context| async { Response::new(StatusCode::Ok).body("hi") })];
/// let ctx = Context::new(Request::new(Method::Get, "/"));
/// let response = tokio::runtime::Builder::new_current_thread()
///     .build()
///     .unwrap()
///     .block_on(Next::new(chain).run(ctx));
/// assert_eq!(response.body_text().unwrap(), "hi");
/// ```
pub fn from_fn<F, Fut>(handler: F) -> MiddlewareHandler
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |ctx: Context, _next: Next| {
        Box::pin(handler(ctx)) as Pin<Box<dyn Future<Output = Response> + Send>>
    })
}

impl Next {
    /// Creates a new `Next` positioned at the start of the given middleware stack.
    pub fn new(middlewares: Vec<MiddlewareHandler>) -> Self {
        Self {
            middlewares,
            index: 0,
        }
    }

    /// Invokes the next middleware in the chain and returns its response.
    ///
    /// If the chain is exhausted without producing a response, a
    /// `500 Internal Server Error` response is returned.
    pub async fn run(mut self, ctx: Context) -> Response {
        if self.index < self.middlewares.len() {
            let handler = self.middlewares[self.index].clone();
            self.index += 1;
            handler(ctx, self).await
        } else {
            Response::new(crate::StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline")
        }
    }
}

/// The core trait for all middleware.
///
/// Implementors receive a [`Context`] and a [`Next`] cursor. They may pass
/// through, short-circuit with their own [`Response`], or decorate the
/// downstream response.
pub trait Middleware: Send + Sync {
    /// Handle the request and optionally delegate to the next middleware.
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs each request's method, URI, status, cache status and duration.
///
/// ```text
/// GET /about - 200 [HIT] (312µs)
/// ```
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_string();
            let uri = ctx.request().request_uri();

            let response = next.run(ctx).await;

            let duration = start.elapsed();
            let status = response.status().as_u16();
            let cache = response
                .headers()
                .get(CACHE_STATUS_HEADER)
                .unwrap_or("-")
                .to_string();

            tracing::info!("{} {} - {} [{}] ({:?})", method, uri, status, cache, duration);

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, Request, StatusCode};

    fn ctx(uri: &str) -> Context {
        Context::new(Request::new(Method::Get, uri))
    }

    #[tokio::test]
    async fn empty_chain_returns_500() {
        let res = Next::new(vec![]).run(ctx("/")).await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let chain = vec![
            from_middleware(Arc::new(LoggerMiddleware)),
            from_fn(|_ctx| async { Response::new(StatusCode::NotFound).body("gone") }),
        ];
        let res = Next::new(chain).run(ctx("/missing")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(res.body_text().unwrap(), "gone");
    }

    #[tokio::test]
    async fn terminal_handler_sees_request() {
        let chain = vec![from_fn(|ctx: Context| async move {
            Response::new(StatusCode::Ok).body(ctx.request().request_uri())
        })];
        let res = Next::new(chain).run(ctx("/echo?x=1")).await;
        assert_eq!(res.body_text().unwrap(), "/echo?x=1");
    }
}
