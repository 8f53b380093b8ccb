//! Requests and responses as seen at the network boundary.

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::fmt;
use url::Url;

/// How the request was initiated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load
    Navigate,
    #[default]
    Other,
}

/// An outgoing request
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::Other,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A document navigation to `url`
    pub fn navigate(url: Url) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url)
    }
}

/// Normalized request identity: method plus URL without fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self(format!("{} {}", method, url))
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

/// A complete HTTP response, from the network or from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
