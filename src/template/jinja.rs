//! [`TemplateEngine`] backed by MiniJinja, which speaks the Jinja/Twig syntax
//! content themes are written in.

use std::path::Path;

use minijinja::{AutoEscape, Environment, ErrorKind};
use tracing::debug;

use super::{RenderContext, TemplateEngine, TemplateError};

/// Extensions that get HTML auto-escaping.
const HTML_EXTENSIONS: &[&str] = &[".html", ".htm", ".twig"];

fn auto_escape_for(name: &str) -> AutoEscape {
    if HTML_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        AutoEscape::Html
    } else {
        AutoEscape::None
    }
}

/// A MiniJinja environment holding named templates.
///
/// # Examples
///
/// ```
/// use rendercache::template::{JinjaEngine, RenderContext, TemplateEngine};
///
/// let mut engine = JinjaEngine::new();
/// engine.add_template("hello.twig", "<h1>{{ title }}</h1>").unwrap();
///
/// let vars = RenderContext::new().with("title", "Fish & Chips");
/// let html = engine.render("hello.twig", &vars).unwrap();
/// assert_eq!(html, "<h1>Fish &amp; Chips</h1>");
/// ```
pub struct JinjaEngine {
    env: Environment<'static>,
}

impl JinjaEngine {
    /// Creates an engine with no templates.
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(auto_escape_for);
        Self { env }
    }

    /// Creates an engine that loads templates on demand from `dir`.
    ///
    /// Template names are paths relative to `dir` (`"partials/nav.twig"`).
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut engine = Self::new();
        engine.env.set_loader(minijinja::path_loader(dir));
        engine
    }

    /// Registers a template from source.
    ///
    /// # Errors
    ///
    /// [`TemplateError::Syntax`] if the source does not parse.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|source| TemplateError::Syntax { name, source })
    }

    /// Exposes the environment for registering filters, functions and globals.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaEngine {
    fn render(&self, template: &str, variables: &RenderContext) -> Result<String, TemplateError> {
        let tmpl = self.env.get_template(template).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => TemplateError::NotFound {
                name: template.to_owned(),
            },
            ErrorKind::SyntaxError => TemplateError::Syntax {
                name: template.to_owned(),
                source: e,
            },
            _ => TemplateError::Render {
                name: template.to_owned(),
                source: e,
            },
        })?;

        debug!(template, vars = variables.len(), "rendering template");

        tmpl.render(variables).map_err(|source| TemplateError::Render {
            name: template.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_loops_and_conditionals() {
        let mut engine = JinjaEngine::new();
        engine
            .add_template(
                "list.twig",
                "{% for item in items %}<li>{{ item }}</li>{% endfor %}{% if footer %}<footer/>{% endif %}",
            )
            .unwrap();

        let vars = RenderContext::new()
            .with("items", json!(["a", "b"]))
            .with("footer", true);
        assert_eq!(
            engine.render("list.twig", &vars).unwrap(),
            "<li>a</li><li>b</li><footer/>"
        );
    }

    #[test]
    fn text_templates_are_not_escaped() {
        let mut engine = JinjaEngine::new();
        engine.add_template("feed.txt", "{{ body }}").unwrap();
        let vars = RenderContext::new().with("body", "<b>");
        assert_eq!(engine.render("feed.txt", &vars).unwrap(), "<b>");
    }

    #[test]
    fn includes_resolve_between_templates() {
        let mut engine = JinjaEngine::new();
        engine.add_template("_nav.twig", "<nav>{{ site }}</nav>").unwrap();
        engine
            .add_template("page.twig", "{% include '_nav.twig' %}<main/>")
            .unwrap();
        let vars = RenderContext::new().with("site", "Acme");
        assert_eq!(
            engine.render("page.twig", &vars).unwrap(),
            "<nav>Acme</nav><main/>"
        );
    }

    #[test]
    fn unknown_template_is_not_found() {
        let engine = JinjaEngine::new();
        let err = engine.render("missing.twig", &RenderContext::new()).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound { name } if name == "missing.twig"));
    }

    #[test]
    fn bad_syntax_is_rejected_on_add() {
        let mut engine = JinjaEngine::new();
        let err = engine.add_template("broken.twig", "{% if %}").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { .. }));
    }

    #[test]
    fn loads_templates_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(dir.path().join("partials/hero.twig"), "<h2>{{ h }}</h2>").unwrap();

        let engine = JinjaEngine::from_dir(dir.path());
        let vars = RenderContext::new().with("h", "Hi");
        assert_eq!(
            engine.render("partials/hero.twig", &vars).unwrap(),
            "<h2>Hi</h2>"
        );
    }
}
