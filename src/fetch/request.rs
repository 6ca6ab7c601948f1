//! Request and response values crossing the network boundary

use crate::error::{SwgateError, SwgateResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// HTTP request method
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

/// An outgoing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: Url,
}

impl Request {
    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
        }
    }

    /// Parse an absolute URL into a GET request
    pub fn parse(url: &str) -> SwgateResult<Self> {
        let url = Url::parse(url).map_err(|e| SwgateError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::get(url))
    }

    /// Key under which the response to this request is cached
    ///
    /// Fragments never reach the server, so they are not part of the key.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.into()
    }

    /// Only GET responses may be stored
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::Get
    }
}

/// A response as returned by the network or the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Final URL the response was served from
    pub url: Url,
    /// HTTP status; 0 marks an opaque cross-origin response
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with no headers
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url,
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Attach a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Opaque responses carry no readable status
    pub fn is_opaque(&self) -> bool {
        self.status == 0
    }

    /// Whether the response was served from the given origin
    pub fn is_same_origin(&self, origin: &url::Origin) -> bool {
        &self.url.origin() == origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_drops_fragment() {
        let req = Request::parse("http://localhost:3000/jobs?page=2#top").unwrap();
        assert_eq!(req.cache_key(), "http://localhost:3000/jobs?page=2");
    }

    #[test]
    fn only_get_is_cacheable() {
        let mut req = Request::parse("http://localhost:3000/").unwrap();
        assert!(req.is_cacheable());
        req.method = Method::Post;
        assert!(!req.is_cacheable());
    }

    #[test]
    fn parse_rejects_relative() {
        let err = Request::parse("/static/js/bundle.js").unwrap_err();
        assert!(matches!(err, SwgateError::InvalidUrl { .. }));
    }

    #[test]
    fn same_origin_check() {
        let origin = Url::parse("http://localhost:3000/").unwrap().origin();
        let local = Response::new(Url::parse("http://localhost:3000/a").unwrap(), 200, "x");
        let remote = Response::new(Url::parse("https://cdn.example.com/a").unwrap(), 200, "x");

        assert!(local.is_same_origin(&origin));
        assert!(!remote.is_same_origin(&origin));
    }

    #[test]
    fn header_names_lowercased() {
        let resp = Response::new(Url::parse("http://a/").unwrap(), 200, "")
            .with_header("Content-Type", "text/html");
        assert_eq!(resp.headers.get("content-type").unwrap(), "text/html");
    }
}
