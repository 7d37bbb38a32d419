//! Configuration access by slash-separated path.
//!
//! Site configuration is a JSON document; values are addressed the way the
//! CMS config files are, e.g. `general/caching/templates`.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

/// Path of the flag enabling per-template caching.
pub const TEMPLATE_CACHING: &str = "general/caching/templates";
/// Path of the flag enabling whole-request caching.
pub const REQUEST_CACHING: &str = "general/caching/request";

/// Errors loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read access to configuration values.
pub trait ConfigSource: Send + Sync {
    /// Looks up the value at a `/`-separated path.
    fn get(&self, path: &str) -> Option<&Value>;

    /// Reads the value at `path` as a boolean flag. Missing paths are `false`.
    fn flag(&self, path: &str) -> bool {
        self.get(path).is_some_and(is_truthy)
    }
}

/// Loose truthiness, so `1`, `"yes"` and `true` all switch a flag on.
///
/// Falsy: `null`, `false`, `0`, empty arrays and objects, and the strings `""`,
/// `"0"`, `"false"`, `"off"`, `"no"` (any case).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty()
                || s == "0"
                || s.eq_ignore_ascii_case("false")
                || s.eq_ignore_ascii_case("off")
                || s.eq_ignore_ascii_case("no"))
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// A [`ConfigSource`] over an in-memory JSON document.
///
/// # Examples
///
/// ```
/// use rendercache::config::{ConfigSource, JsonConfig};
///
/// let config: JsonConfig = r#"{"general": {"caching": {"templates": true, "request": 0}}}"#
///     .parse()
///     .unwrap();
///
/// assert!(config.flag("general/caching/templates"));
/// assert!(!config.flag("general/caching/request"));
/// assert!(!config.flag("general/caching/missing"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    root: Value,
}

impl JsonConfig {
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        raw.parse()
    }

    /// Sets the value at `path`, creating intermediate objects as needed.
    /// Non-object values along the way are replaced.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        let mut node = &mut self.root;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !node.is_object() {
                *node = Value::Object(serde_json::Map::new());
            }
            node = match node {
                Value::Object(map) => map.entry(segment).or_insert(Value::Null),
                _ => unreachable!("node was just made an object"),
            };
        }
        *node = value.into();
    }
}

impl FromStr for JsonConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_value(serde_json::from_str(s)?))
    }
}

impl ConfigSource for JsonConfig {
    fn get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(&self.root, |node, segment| node.get(segment))
    }
}

/// The two caching switches, read once from a [`ConfigSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachingFlags {
    pub templates: bool,
    pub request: bool,
}

impl CachingFlags {
    pub fn from_config(config: &dyn ConfigSource) -> Self {
        Self {
            templates: config.flag(TEMPLATE_CACHING),
            request: config.flag(REQUEST_CACHING),
        }
    }
}
