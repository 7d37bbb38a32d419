//! Template rendering — the engine seam and a MiniJinja-backed implementation.
//!
//! The render wrapper only needs `render(name, variables) -> markup`; anything
//! that can do that implements [`TemplateEngine`].

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod jinja;

pub use jinja::JinjaEngine;

/// Errors raised while rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {name}")]
    NotFound { name: String },

    #[error("syntax error in {name}: {source}")]
    Syntax {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to render {name}: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

/// Renders named templates.
pub trait TemplateEngine: Send + Sync {
    /// Renders `template` with `variables`, returning the markup.
    fn render(&self, template: &str, variables: &RenderContext) -> Result<String, TemplateError>;
}

/// Variables handed to a template, keyed by name.
///
/// The map is passed to the engine unchanged; insertion order is irrelevant.
///
/// # Examples
///
/// ```
/// use rendercache::template::RenderContext;
/// use serde_json::json;
///
/// let mut vars = RenderContext::new();
/// vars.insert("title", "About us");
/// vars.insert("tags", json!(["news", "team"]));
///
/// assert_eq!(vars.get("title"), Some(&json!("About us")));
/// assert_eq!(vars.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderContext {
    vars: Map<String, Value>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Copies every variable from `other`, overwriting on conflict.
    pub fn extend(&mut self, other: RenderContext) {
        self.vars.extend(other.vars);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl From<Map<String, Value>> for RenderContext {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}
