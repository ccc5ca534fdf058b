//! HTTP client with rate limiting and the catalog fetch boundary
//!
//! The catalog source and the image host are external collaborators; every
//! request carries a bounded timeout and goes through a shared rate limiter
//! so repeated runs stay polite.

use crate::domain::entities::SourceRecord;
use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "catalog-sync/0.2".to_string(),
            timeout_seconds: 30,
            max_requests_per_second: 10,
        }
    }
}

/// Rate-limited HTTP client shared by the catalog fetcher and image ingestor.
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );
        let rate_limiter = RateLimiter::direct(quota);

        Ok(Self { client, rate_limiter, config })
    }

    /// Fetch a URL after waiting for the rate limiter. The response is
    /// returned regardless of status so callers can branch on it.
    pub async fn get_raw(&self, url: &str) -> Result<Response> {
        self.rate_limiter.until_ready().await;

        tracing::debug!("Fetching URL: {}", url);

        self.client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {url}"))
    }

    /// Fetch a URL, treating any non-success status as an error.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self.get_raw(url).await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP request failed with status {}: {}", response.status(), url);
        }
        Ok(response)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

/// Errors at the catalog fetch boundary. Fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to fetch products from API: {status}")]
    Status { status: u16 },
    #[error("Failed to fetch products from API: {0}")]
    Transport(String),
    #[error("Failed to decode product list: {0}")]
    Decode(String),
}

/// Retrieves the full record set from the source catalog in one call.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch_catalog(&self) -> Result<Vec<SourceRecord>, FetchError>;
}

/// HTTP implementation against the configured source URL.
pub struct HttpCatalogFetcher {
    http: std::sync::Arc<HttpClient>,
    api_url: String,
}

impl HttpCatalogFetcher {
    pub fn new(http: std::sync::Arc<HttpClient>, api_url: String) -> Self {
        Self { http, api_url }
    }
}

#[async_trait]
impl CatalogFetcher for HttpCatalogFetcher {
    async fn fetch_catalog(&self) -> Result<Vec<SourceRecord>, FetchError> {
        let response = self
            .http
            .get_raw(&self.api_url)
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        response
            .json::<Vec<SourceRecord>>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let config = HttpClientConfig::default();
        let client = HttpClient::new(config);
        assert!(client.is_ok());
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let config = HttpClientConfig { max_requests_per_second: 0, ..Default::default() };
        assert!(HttpClient::new(config).is_err());
    }

    #[test]
    fn fetch_error_carries_status() {
        let err = FetchError::Status { status: 503 };
        assert_eq!(err.to_string(), "Failed to fetch products from API: 503");
    }
}
