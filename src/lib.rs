//! # rendercache
//!
//! A read-through render cache for template-driven HTTP responses.
//!
//! Templates are rendered through a [`TemplateEngine`](template::TemplateEngine)
//! and cached per template and request URI; finished pages are post-processed
//! (snippet injection) and cached per request URI. Caching only applies to the
//! public frontend and is switched on by the `general/caching/templates` and
//! `general/caching/request` config flags.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rendercache::cache::MemoryCache;
//! use rendercache::config::JsonConfig;
//! use rendercache::render::RenderServices;
//! use rendercache::template::{JinjaEngine, RenderContext};
//! use rendercache::{Method, Request};
//!
//! let mut engine = JinjaEngine::new();
//! engine.add_template("page.twig", "<h1>{{ title }}</h1>").unwrap();
//! let config: JsonConfig = r#"{"general":{"caching":{"templates":true,"request":true}}}"#
//!     .parse()
//!     .unwrap();
//! let services = RenderServices::new(
//!     Arc::new(engine),
//!     Arc::new(MemoryCache::new()),
//!     Arc::new(config),
//! );
//!
//! let request = Request::new(Method::Get, "/about");
//! let render = services.for_request(&request);
//! let html = render
//!     .render("page.twig", &RenderContext::new().with("title", "About"))
//!     .unwrap();
//! assert_eq!(html, "<h1>About</h1>");
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod extensions;
pub mod http;
pub mod middleware;
pub mod profiler;
pub mod render;
pub mod template;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use render::{Render, RenderError, RenderServices};
