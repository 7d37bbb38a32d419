//! Whole-page caching in the middleware pipeline.

use std::{future::Future, pin::Pin, sync::Arc};

use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::config::REQUEST_CACHING;
use crate::context::{Context, RequestUri};
use crate::render::RenderServices;
use crate::{Response, StatusCode};

/// Response header reporting whether the body came from the request cache.
pub const CACHE_STATUS_HEADER: &str = "X-Cache";

/// Serves cached pages before the handler runs and post-processes what it returns.
///
/// # Behavior
///
/// - For `GET` in the frontend with `general/caching/request` on, a
///   request-cache hit is returned directly as `200` with `X-Cache: HIT`; the
///   handler is **not** called.
/// - Otherwise the handler runs. Successful responses to `GET` with an HTML (or
///   untyped) non-empty body are passed through [`Render::post_process`], which
///   injects snippets and caches the result; the body is replaced by its output.
/// - Cache failures are logged and treated as misses, so a broken backend never
///   takes the site down.
///
/// [`Render::post_process`]: crate::render::Render::post_process
pub struct PageCacheMiddleware {
    services: Arc<RenderServices>,
}

impl PageCacheMiddleware {
    pub fn new(services: Arc<RenderServices>) -> Self {
        Self { services }
    }
}

fn request_caching_active(services: &RenderServices) -> bool {
    services.end().is_frontend() && services.config().flag(REQUEST_CACHING)
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get("content-type")
        .is_none_or(|ct| ct.to_ascii_lowercase().contains("html"))
}

impl Middleware for PageCacheMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let services = Arc::clone(&self.services);

        Box::pin(async move {
            let method = ctx.request().method().clone();
            let uri = ctx.request_uri();
            let active = method.is_cacheable() && request_caching_active(&services);

            if active {
                match services.for_request(uri.as_str()).fetch_cached_request() {
                    Ok(Some(html)) if !html.is_empty() => {
                        debug!(uri = %uri, "serving request from cache");
                        return Response::new(StatusCode::Ok)
                            .header("Content-Type", "text/html; charset=utf-8")
                            .header(CACHE_STATUS_HEADER, "HIT")
                            .body(html);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(uri = %uri, error = %e, "request cache lookup failed"),
                }
            }

            let mut response = next.run(ctx).await;

            let processable = method.is_cacheable()
                && response.status().is_success()
                && !response.body_raw().is_empty()
                && is_html(&response);
            if !processable {
                return response;
            }

            match services.for_request(uri.as_str()).post_process(&response) {
                Ok(html) => {
                    response.set_body(html);
                    if active {
                        response.add_header(CACHE_STATUS_HEADER, "MISS");
                    }
                }
                Err(e) => warn!(uri = %uri, error = %e, "post-processing failed"),
            }

            response
        })
    }
}
