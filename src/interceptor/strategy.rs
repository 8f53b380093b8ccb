//! Request classification.
//!
//! First match wins:
//!
//! 1. non-GET: passed through untouched
//! 2. API prefix: network first
//! 3. static asset, site root or `.html` document: cache first
//! 4. anything else: network first

use super::request::InterceptedRequest;
use reqwest::Method;

const STATIC_EXTENSIONS: &[&str] = &[
    "js", "css", "png", "jpg", "jpeg", "gif", "svg", "woff", "woff2", "ttf", "eot",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PassThrough,
    NetworkFirst,
    CacheFirst,
}

pub fn classify(request: &InterceptedRequest, api_prefix: &str) -> Strategy {
    if request.method != Method::GET {
        return Strategy::PassThrough;
    }

    let path = request.url.path();
    if path.starts_with(api_prefix) {
        return Strategy::NetworkFirst;
    }
    if path == "/" || path.ends_with(".html") || is_static_asset(path) {
        return Strategy::CacheFirst;
    }
    Strategy::NetworkFirst
}

fn is_static_asset(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn get(path: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse("http://app.local").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_non_get_passes_through() {
        let request = InterceptedRequest::new(
            Method::POST,
            Url::parse("http://app.local/api/brain/sync").unwrap(),
        );
        assert_eq!(classify(&request, "/api/"), Strategy::PassThrough);

        let request =
            InterceptedRequest::new(Method::PUT, Url::parse("http://app.local/app.js").unwrap());
        assert_eq!(classify(&request, "/api/"), Strategy::PassThrough);
    }

    #[test]
    fn test_api_is_network_first() {
        assert_eq!(classify(&get("/api/v1/catalog"), "/api/"), Strategy::NetworkFirst);
        // Even when it looks like an asset
        assert_eq!(classify(&get("/api/export.css"), "/api/"), Strategy::NetworkFirst);
    }

    #[test]
    fn test_static_and_documents_are_cache_first() {
        for path in [
            "/",
            "/index.html",
            "/assets/app.3f9c.js",
            "/style.css",
            "/logo.svg",
            "/fonts/inter.woff2",
            "/fonts/inter.woff",
            "/img/photo.jpeg",
        ] {
            assert_eq!(classify(&get(path), "/api/"), Strategy::CacheFirst, "{}", path);
        }
    }

    #[test]
    fn test_everything_else_is_network_first() {
        for path in ["/manifest.json", "/dashboard", "/script.jsx", "/.css", "/assets/"] {
            assert_eq!(classify(&get(path), "/api/"), Strategy::NetworkFirst, "{}", path);
        }
    }
}
