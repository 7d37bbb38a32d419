//! The render wrapper — template rendering with read-through/write-through caching.
//!
//! [`RenderServices`] holds the collaborators shared by every request; calling
//! [`RenderServices::for_request`] binds them to one request and yields a
//! [`Render`], which exposes the caching operations:
//!
//! - [`Render::render`] — serve a template from cache, or render and cache it.
//! - [`Render::post_process`] — inject snippets into the final body and cache
//!   the whole response.
//! - [`Render::fetch_cached_page`] / [`Render::fetch_cached_request`] — lookups.
//! - [`Render::cache_rendered_page`] / [`Render::cache_request`] — gated writes.
//!
//! Writes happen only in the [`End::Frontend`] context and only when the
//! matching config flag (`general/caching/templates` or
//! `general/caching/request`) is on. Entries live for [`PAGE_TTL`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::Response;
use crate::cache::{CacheError, CacheKey, CacheStore, PAGE_TTL};
use crate::config::{ConfigSource, REQUEST_CACHING, TEMPLATE_CACHING};
use crate::context::{End, RequestUri};
use crate::extensions::{NoSnippets, SnippetProcessor};
use crate::profiler::Stopwatch;
use crate::template::{RenderContext, TemplateEngine, TemplateError};

/// Stopwatch event name for template renders.
pub const RENDER_EVENT: &str = "bolt.render";
const RENDER_CATEGORY: &str = "template";

/// Errors surfaced by the render wrapper. Collaborator errors pass through as-is.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("response body is not valid UTF-8: {0}")]
    Body(#[from] std::str::Utf8Error),
}

/// Collaborators shared across requests.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use rendercache::cache::MemoryCache;
/// use rendercache::config::JsonConfig;
/// use rendercache::context::End;
/// use rendercache::render::RenderServices;
/// use rendercache::template::{JinjaEngine, RenderContext};
///
/// let mut engine = JinjaEngine::new();
/// engine.add_template("page.twig", "<h1>{{ title }}</h1>").unwrap();
/// let config: JsonConfig = r#"{"general":{"caching":{"templates":true}}}"#.parse().unwrap();
///
/// let services = RenderServices::new(Arc::new(engine), Arc::new(MemoryCache::new()), Arc::new(config))
///     .with_end(End::Frontend);
///
/// let render = services.for_request("/about");
/// let vars = RenderContext::new().with("title", "About");
/// assert_eq!(render.render("page.twig", &vars).unwrap(), "<h1>About</h1>");
/// assert!(render.fetch_cached_page("page.twig").unwrap().is_some());
/// ```
#[derive(Clone)]
pub struct RenderServices {
    engine: Arc<dyn TemplateEngine>,
    cache: Arc<dyn CacheStore>,
    config: Arc<dyn ConfigSource>,
    snippets: Arc<dyn SnippetProcessor>,
    stopwatch: Arc<Stopwatch>,
    end: End,
}

impl RenderServices {
    /// Bundles the required collaborators. Snippet processing defaults to a
    /// no-op and the execution context to [`End::Frontend`].
    pub fn new(
        engine: Arc<dyn TemplateEngine>,
        cache: Arc<dyn CacheStore>,
        config: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            engine,
            cache,
            config,
            snippets: Arc::new(NoSnippets),
            stopwatch: Arc::new(Stopwatch::new()),
            end: End::default(),
        }
    }

    #[must_use]
    pub fn with_snippets(mut self, snippets: Arc<dyn SnippetProcessor>) -> Self {
        self.snippets = snippets;
        self
    }

    #[must_use]
    pub fn with_stopwatch(mut self, stopwatch: Arc<Stopwatch>) -> Self {
        self.stopwatch = stopwatch;
        self
    }

    #[must_use]
    pub fn with_end(mut self, end: End) -> Self {
        self.end = end;
        self
    }

    pub fn end(&self) -> End {
        self.end
    }

    pub fn config(&self) -> &dyn ConfigSource {
        self.config.as_ref()
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    /// Binds the services to the request being served.
    pub fn for_request<R>(&self, request: &R) -> Render<'_>
    where
        R: RequestUri + ?Sized,
    {
        Render {
            services: self,
            request_uri: request.request_uri(),
        }
    }
}

/// The render wrapper for a single request.
pub struct Render<'a> {
    services: &'a RenderServices,
    request_uri: String,
}

impl Render<'_> {
    pub fn request_uri(&self) -> &str {
        &self.request_uri
    }

    /// Key for `template` rendered at this request's URI.
    pub fn page_key(&self, template: &str) -> CacheKey {
        CacheKey::page(template, &self.request_uri)
    }

    /// Key for this whole request.
    pub fn request_key(&self) -> CacheKey {
        CacheKey::request(&self.request_uri)
    }

    /// Renders `template`, serving a cached copy when one exists.
    ///
    /// On a hit the cached markup is returned verbatim and the engine is not
    /// called, so `variables` are ignored. On a miss the engine renders once and
    /// the output is offered to [`cache_rendered_page`](Self::cache_rendered_page).
    /// An empty cached string counts as a miss.
    ///
    /// # Errors
    ///
    /// Cache and template errors propagate unchanged.
    pub fn render(&self, template: &str, variables: &RenderContext) -> Result<String, RenderError> {
        let stopwatch = &self.services.stopwatch;
        stopwatch.start(RENDER_EVENT, RENDER_CATEGORY);
        let result = self.render_inner(template, variables);
        stopwatch.stop(RENDER_EVENT);
        result
    }

    fn render_inner(&self, template: &str, variables: &RenderContext) -> Result<String, RenderError> {
        if let Some(html) = self.fetch_cached_page(template)?.filter(|html| !html.is_empty()) {
            debug!(template, uri = %self.request_uri, "template served from cache");
            return Ok(html);
        }

        let html = self.services.engine.render(template, variables)?;
        self.cache_rendered_page(template, &html)?;
        Ok(html)
    }

    /// Runs the final response body through snippet processing and caches the
    /// result as the whole-request entry.
    ///
    /// # Errors
    ///
    /// [`RenderError::Body`] if the body is not UTF-8; cache errors propagate.
    pub fn post_process(&self, response: &Response) -> Result<String, RenderError> {
        let body = response.body_text()?;
        let html = self.services.snippets.process_snippet_queue(body);
        self.cache_request(&html)?;
        Ok(html)
    }

    /// Looks up this request's cached copy of `template`.
    pub fn fetch_cached_page(&self, template: &str) -> Result<Option<String>, RenderError> {
        let key = self.page_key(template);
        Ok(self.services.cache.fetch(key.as_str())?)
    }

    /// Looks up the cached, fully post-processed body for this request.
    pub fn fetch_cached_request(&self) -> Result<Option<String>, RenderError> {
        let key = self.request_key();
        Ok(self.services.cache.fetch(key.as_str())?)
    }

    /// Stores rendered `html` for `template` when template caching is active.
    pub fn cache_rendered_page(&self, template: &str, html: &str) -> Result<(), RenderError> {
        if !self.writes_enabled(TEMPLATE_CACHING) {
            trace!(template, end = %self.services.end, "template caching skipped");
            return Ok(());
        }

        let key = self.page_key(template);
        self.services.cache.save(key.as_str(), html, PAGE_TTL)?;
        debug!(template, uri = %self.request_uri, key = %key, "cached rendered template");
        Ok(())
    }

    /// Stores the whole-request `html` when request caching is active.
    pub fn cache_request(&self, html: &str) -> Result<(), RenderError> {
        if !self.writes_enabled(REQUEST_CACHING) {
            trace!(end = %self.services.end, "request caching skipped");
            return Ok(());
        }

        let key = self.request_key();
        self.services.cache.save(key.as_str(), html, PAGE_TTL)?;
        debug!(uri = %self.request_uri, key = %key, "cached request");
        Ok(())
    }

    fn writes_enabled(&self, flag: &str) -> bool {
        self.services.end.is_frontend() && self.services.config.flag(flag)
    }
}
