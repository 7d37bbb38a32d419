//! Renders the same page three times through the middleware pipeline and shows
//! the cache taking over after the first request.
//!
//! Run with `RUST_LOG=rendercache=debug` to see cache decisions.

use std::sync::Arc;

use rendercache::cache::MemoryCache;
use rendercache::config::JsonConfig;
use rendercache::context::{Context, End};
use rendercache::extensions::{SnippetLocation, SnippetQueue};
use rendercache::middleware::{LoggerMiddleware, Next, PageCacheMiddleware, from_fn, from_middleware};
use rendercache::render::RenderServices;
use rendercache::template::{JinjaEngine, RenderContext};
use rendercache::{Request, Response, StatusCode};

const LAYOUT: &str = r#"<!doctype html>
<html>
<head><title>{{ title }}</title></head>
<body>
  <h1>{{ title }}</h1>
  {% for entry in entries %}<article>{{ entry }}</article>{% endfor %}
</body>
</html>"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rendercache=info".into()),
        )
        .init();

    let mut engine = JinjaEngine::new();
    engine.add_template("listing.twig", LAYOUT)?;

    let config: JsonConfig =
        r#"{"general": {"caching": {"templates": true, "request": true}}}"#.parse()?;

    let snippets = SnippetQueue::new();
    snippets.add(
        SnippetLocation::EndOfHead,
        r#"<link rel="stylesheet" href="/theme.css">"#,
    );

    let services = Arc::new(
        RenderServices::new(Arc::new(engine), Arc::new(MemoryCache::new()), Arc::new(config))
            .with_snippets(Arc::new(snippets))
            .with_end(End::Frontend),
    );

    let handler_services = Arc::clone(&services);
    let chain = vec![
        from_middleware(Arc::new(LoggerMiddleware)),
        from_middleware(Arc::new(PageCacheMiddleware::new(Arc::clone(&services)))),
        from_fn(move |ctx: Context| {
            let services = Arc::clone(&handler_services);
            async move {
                let vars = RenderContext::new()
                    .with("title", "Latest entries")
                    .with("entries", vec!["First post", "Second post"]);
                match services.for_request(ctx.request()).render("listing.twig", &vars) {
                    Ok(html) => Response::new(StatusCode::Ok)
                        .header("Content-Type", "text/html; charset=utf-8")
                        .body(html),
                    Err(e) => Response::new(StatusCode::InternalServerError).body(e.to_string()),
                }
            }
        }),
    ];

    let wire = b"GET /entries?page=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
    for _ in 0..3 {
        let (request, _) = Request::parse(wire)?;
        let ctx = Context::new(request);
        let response = Next::new(chain.clone()).run(ctx).await;
        println!(
            "{} X-Cache={}",
            response.status(),
            response.headers().get("X-Cache").unwrap_or("-")
        );
    }

    for event in services.stopwatch().events() {
        println!("{} ({}): {:?}", event.name, event.category, event.duration);
    }

    Ok(())
}
