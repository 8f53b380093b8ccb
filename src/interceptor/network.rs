//! The real network underneath the interceptor.

use super::request::{CachedResponse, InterceptedRequest};
use crate::shared::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;

/// Performs a request; any HTTP response, whatever its status, is `Ok`
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, FetchError> {
        let url = request.url.as_str();
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::network(url, e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(url, e.to_string()))?;

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
