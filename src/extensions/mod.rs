//! Snippet injection — extension-provided markup spliced into rendered pages.
//!
//! Extensions queue snippets (analytics tags, stylesheets, widgets) against a
//! [`SnippetLocation`]; after the page is rendered the queue is applied to the
//! final markup.

use std::sync::{LazyLock, Mutex, PoisonError};

use regex::Regex;
use tracing::{debug, trace};

/// Post-render processing of markup.
pub trait SnippetProcessor: Send + Sync {
    /// Returns `html` with every queued snippet inserted.
    fn process_snippet_queue(&self, html: &str) -> String;
}

/// Leaves markup untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnippets;

impl SnippetProcessor for NoSnippets {
    fn process_snippet_queue(&self, html: &str) -> String {
        html.to_owned()
    }
}

/// Where in the document a snippet goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnippetLocation {
    /// Right after the opening `<head>` tag.
    StartOfHead,
    /// Right before `</head>`.
    EndOfHead,
    /// Right after the opening `<body>` tag.
    StartOfBody,
    /// Right before `</body>`.
    EndOfBody,
    /// Right before `</html>`.
    EndOfHtml,
}

static HEAD_OPEN: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)<head(\s[^>]*)?>"));
static HEAD_CLOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)</head\s*>"));
static BODY_OPEN: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)<body(\s[^>]*)?>"));
static BODY_CLOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)</body\s*>"));
static HTML_CLOSE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)</html\s*>"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("snippet marker patterns are valid")
}

impl SnippetLocation {
    // Byte offset in `html` where a snippet for this location is inserted.
    fn insertion_point(self, html: &str) -> Option<usize> {
        match self {
            Self::StartOfHead => HEAD_OPEN.find(html).map(|m| m.end()),
            Self::EndOfHead => HEAD_CLOSE.find(html).map(|m| m.start()),
            Self::StartOfBody => BODY_OPEN.find(html).map(|m| m.end()),
            // Closing tags are searched from the end: inline scripts may contain them.
            Self::EndOfBody => BODY_CLOSE.find_iter(html).last().map(|m| m.start()),
            Self::EndOfHtml => HTML_CLOSE.find_iter(html).last().map(|m| m.start()),
        }
    }
}

/// A queue of snippets applied to every page rendered for the current request.
///
/// Snippets for the same location keep their queue order. When a page lacks the
/// marker for a location, the snippet is appended to the end of the markup.
///
/// # Examples
///
/// ```
/// use rendercache::extensions::{SnippetLocation, SnippetProcessor, SnippetQueue};
///
/// let queue = SnippetQueue::new();
/// queue.add(SnippetLocation::EndOfHead, "<link rel=\"stylesheet\" href=\"/x.css\">");
///
/// let html = queue.process_snippet_queue("<html><head></head><body></body></html>");
/// assert_eq!(
///     html,
///     "<html><head><link rel=\"stylesheet\" href=\"/x.css\"></head><body></body></html>"
/// );
/// ```
#[derive(Debug, Default)]
pub struct SnippetQueue {
    queue: Mutex<Vec<(SnippetLocation, String)>>,
}

impl SnippetQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `snippet` for insertion at `location`.
    pub fn add(&self, location: SnippetLocation, snippet: impl Into<String>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((location, snippet.into()));
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every queued snippet.
    pub fn clear(&self) {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl SnippetProcessor for SnippetQueue {
    fn process_snippet_queue(&self, html: &str) -> String {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.is_empty() {
            return html.to_owned();
        }

        let mut out = html.to_owned();
        for (location, snippet) in queue.iter() {
            match location.insertion_point(&out) {
                Some(at) => out.insert_str(at, snippet),
                None => {
                    trace!(?location, "marker missing, appending snippet");
                    out.push_str(snippet);
                }
            }
        }

        debug!(snippets = queue.len(), "processed snippet queue");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html lang=\"en\"><head><title>t</title></head><body class=\"home\"><p>x</p></body></html>";

    #[test]
    fn every_location_lands_at_its_marker() {
        let queue = SnippetQueue::new();
        queue.add(SnippetLocation::StartOfHead, "<meta a>");
        queue.add(SnippetLocation::EndOfHead, "<meta b>");
        queue.add(SnippetLocation::StartOfBody, "<div c>");
        queue.add(SnippetLocation::EndOfBody, "<script d></script>");
        queue.add(SnippetLocation::EndOfHtml, "<!-- e -->");

        assert_eq!(
            queue.process_snippet_queue(PAGE),
            "<html lang=\"en\"><head><meta a><title>t</title><meta b></head>\
             <body class=\"home\"><div c><p>x</p><script d></script></body><!-- e --></html>"
        );
    }

    #[test]
    fn same_location_keeps_queue_order() {
        let queue = SnippetQueue::new();
        queue.add(SnippetLocation::EndOfBody, "1");
        queue.add(SnippetLocation::EndOfBody, "2");
        let out = queue.process_snippet_queue("<body></body>");
        assert_eq!(out, "<body>12</body>");
    }

    #[test]
    fn missing_marker_appends() {
        let queue = SnippetQueue::new();
        queue.add(SnippetLocation::EndOfHead, "<style></style>");
        assert_eq!(
            queue.process_snippet_queue("<p>fragment</p>"),
            "<p>fragment</p><style></style>"
        );
    }

    #[test]
    fn markers_are_case_insensitive() {
        let queue = SnippetQueue::new();
        queue.add(SnippetLocation::EndOfBody, "!");
        assert_eq!(queue.process_snippet_queue("<BODY>x</BODY>"), "<BODY>x!</BODY>");
    }

    #[test]
    fn header_tag_is_not_head() {
        let queue = SnippetQueue::new();
        queue.add(SnippetLocation::StartOfHead, "<meta>");
        assert_eq!(
            queue.process_snippet_queue("<header></header>"),
            "<header></header><meta>"
        );
    }

    #[test]
    fn queue_survives_processing() {
        let queue = SnippetQueue::new();
        queue.add(SnippetLocation::EndOfHtml, "x");
        queue.process_snippet_queue("</html>");
        assert_eq!(queue.len(), 1);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.process_snippet_queue("<p/>"), "<p/>");
    }

    #[test]
    fn no_snippets_is_identity() {
        assert_eq!(NoSnippets.process_snippet_queue(PAGE), PAGE);
    }
}
