//! Caching layer — key derivation and key-value stores for rendered markup.
//!
//! Rendered output is cached under one of two keys:
//!
//! | Key                  | Digest input          | Holds                                 |
//! |----------------------|-----------------------|---------------------------------------|
//! | [`CacheKey::page`]   | `template + uri`      | output of one template for one URI    |
//! | [`CacheKey::request`]| `uri`                 | the fully post-processed response body|
//!
//! Stores implement [`CacheStore`]; [`MemoryCache`] and [`FileCache`] ship with
//! the crate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileCache;
pub use memory::{CacheStats, MemoryCache, PURGE_INTERVAL};

/// How long rendered pages and requests stay cached.
pub const PAGE_TTL: Duration = Duration::from_secs(300);

/// Errors produced by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot encode cache entry {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A cache key: the lowercase hex MD5 digest of its input.
///
/// # Examples
///
/// ```
/// use rendercache::cache::CacheKey;
///
/// let page = CacheKey::page("page.twig", "/about");
/// assert_eq!(page, CacheKey::digest("page.twig/about"));
/// assert_eq!(page.as_str().len(), 32);
/// assert_ne!(page, CacheKey::request("/about"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for one template rendered at one request URI.
    pub fn page(template: &str, request_uri: &str) -> Self {
        let mut input = String::with_capacity(template.len() + request_uri.len());
        input.push_str(template);
        input.push_str(request_uri);
        Self::digest(&input)
    }

    /// Key for a whole request, i.e. the page key with an empty template name.
    pub fn request(request_uri: &str) -> Self {
        Self::digest(request_uri)
    }

    /// Hashes arbitrary input into a key.
    pub fn digest(input: &str) -> Self {
        Self(format!("{:x}", md5::compute(input.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A string-keyed store for rendered markup.
///
/// Implementations must be shareable across requests. An entry whose TTL has
/// elapsed must read as absent.
pub trait CacheStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` on a miss.
    fn fetch(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` for `ttl`, replacing any previous entry.
    fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Removes the entry under `key`. Returns `true` if one existed.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), CacheError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_key_is_md5_of_concatenation() {
        // md5("page.twig/about")
        let key = CacheKey::page("page.twig", "/about");
        assert_eq!(key.as_str(), format!("{:x}", md5::compute(b"page.twig/about")));
    }

    #[test]
    fn keys_are_deterministic() {
        assert_eq!(
            CacheKey::page("entry.twig", "/blog/1"),
            CacheKey::page("entry.twig", "/blog/1")
        );
        assert_eq!(CacheKey::request("/blog/1"), CacheKey::request("/blog/1"));
    }

    #[test]
    fn keys_differ_when_either_input_differs() {
        let base = CacheKey::page("entry.twig", "/blog/1");
        assert_ne!(base, CacheKey::page("listing.twig", "/blog/1"));
        assert_ne!(base, CacheKey::page("entry.twig", "/blog/2"));
        assert_ne!(base, CacheKey::page("entry.twig", "/blog/1?page=2"));
    }

    #[test]
    fn request_key_equals_page_key_with_empty_template() {
        assert_eq!(CacheKey::request("/about"), CacheKey::page("", "/about"));
    }

    #[test]
    fn key_is_lowercase_hex() {
        let key = CacheKey::request("/");
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(key.to_string(), key.as_str());
    }
}
