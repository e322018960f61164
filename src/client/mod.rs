// Resilient upstream access: cache, pacing and retry around one call site
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Serialize, Deserialize};
use tracing::{debug, error};

use crate::cache::BoundedCache;
use crate::rate_limit::RateLimiter;
use crate::retry::{transient_status, Retryable, RetryPolicy};

pub mod http;

pub use http::HttpTransport;

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub requests_per_second: u32,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ws.audioscrobbler.com/2.0/".to_string(),
            api_key: String::new(),
            requests_per_second: 5,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// An upstream call: a URL plus query parameters. The body shape the
/// upstream answers with is opaque to this layer.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            query: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// artist.getcorrection call; memoized under the `corr` key prefix.
    pub fn artist_correction(config: &ApiConfig, artist: &str) -> Self {
        Self::new(&config.base_url)
            .with_param("method", "artist.getcorrection")
            .with_param("api_key", &config.api_key)
            .with_param("format", "json")
            .with_param("artist", artist)
    }

    /// artist.gettoptags call; memoized under the `tag` key prefix.
    pub fn artist_top_tags(config: &ApiConfig, artist: &str) -> Self {
        Self::new(&config.base_url)
            .with_param("method", "artist.gettoptags")
            .with_param("api_key", &config.api_key)
            .with_param("format", "json")
            .with_param("artist", artist)
    }
}

/// Cache key for an artist correction lookup.
pub fn correction_cache_key(artist: &str) -> String {
    format!("corr{}", artist)
}

/// Cache key for an artist top-tags lookup.
pub fn tags_cache_key(artist: &str) -> String {
    format!("tag{}", artist)
}

/// A successful upstream response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Upstream failure, classified once at the transport boundary.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Retryable for ApiError {
    fn is_transient(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Connect(_) | ApiError::Transport(_) => true,
            ApiError::Status(code) => transient_status(*code),
            ApiError::Malformed(_) => false,
        }
    }
}

/// Capability to perform one upstream call.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Composes the cache, the rate limiter and the retry policy around a
/// transport: check cache, pace the dispatch, call with retry, populate the
/// cache on success.
pub struct ResilientClient<T> {
    transport: Arc<T>,
    cache: BoundedCache<Vec<u8>>,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
}

impl<T: Transport> ResilientClient<T> {
    pub fn new(
        transport: Arc<T>,
        cache: BoundedCache<Vec<u8>>,
        rate_limiter: RateLimiter,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            cache,
            rate_limiter,
            retry,
        }
    }

    /// Fetch the response body for `request`, memoized under `cache_key`.
    ///
    /// A cache hit returns immediately without touching the limiter or the
    /// network. On failure after retries the error is logged and returned;
    /// the caller decides whether a missing enrichment is fatal.
    pub async fn fetch_cached(
        &self,
        cache_key: &str,
        request: &ApiRequest,
    ) -> Result<Vec<u8>, ApiError> {
        if let Some(body) = self.cache.get(cache_key) {
            debug!("Cache hit for {}", cache_key);
            return Ok(body);
        }

        self.rate_limiter.acquire().await;

        match self
            .retry
            .execute_with_retry(|| self.transport.fetch(request), cache_key)
            .await
        {
            Ok(response) => {
                self.cache.set(cache_key, response.body.clone());
                Ok(response.body)
            }
            Err(err) => {
                error!("Upstream fetch failed for {}: {}", cache_key, err);
                Err(err)
            }
        }
    }

    pub fn cache(&self) -> &BoundedCache<Vec<u8>> {
        &self.cache
    }
}
