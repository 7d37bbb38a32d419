//! Execution context — which side of the site is rendering, and for which request.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::Request;

/// The part of the application handling the current request.
///
/// Only [`End::Frontend`] output is cached; administrative pages, async
/// fragments and console commands always render fresh.
///
/// # Examples
///
/// ```
/// use rendercache::context::End;
///
/// let end: End = "frontend".parse().unwrap();
/// assert!(end.is_frontend());
/// assert_eq!(End::Backend.to_string(), "backend");
/// assert!("sideways".parse::<End>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum End {
    #[default]
    Frontend,
    Backend,
    Async,
    Cli,
}

impl End {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Async => "async",
            Self::Cli => "cli",
        }
    }

    pub fn is_frontend(self) -> bool {
        self == Self::Frontend
    }
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown execution context: {0:?}")]
pub struct UnknownEnd(pub String);

impl FromStr for End {
    type Err = UnknownEnd;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "async" => Ok(Self::Async),
            "cli" => Ok(Self::Cli),
            _ => Err(UnknownEnd(s.to_owned())),
        }
    }
}

/// Anything that knows the URI of the request being served.
pub trait RequestUri {
    /// The request target: path plus `?query` when present.
    fn request_uri(&self) -> String;
}

impl RequestUri for Request {
    fn request_uri(&self) -> String {
        Request::request_uri(self)
    }
}

impl RequestUri for str {
    fn request_uri(&self) -> String {
        self.to_owned()
    }
}

impl RequestUri for String {
    fn request_uri(&self) -> String {
        self.clone()
    }
}

/// Per-request context handed through the middleware pipeline.
pub struct Context {
    request: Request,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}

impl RequestUri for Context {
    fn request_uri(&self) -> String {
        self.request.request_uri()
    }
}
