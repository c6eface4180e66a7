//! HTTP page fetcher with rate limiting and retry
//!
//! The production implementation of the fetch collaborator:
//! - rate limiting with governor ahead of every request
//! - retry with exponential backoff on retryable statuses and timeouts
//! - configured User-Agent, falling back to a rotation pool

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::worker::agent::FetchExtract;
use crate::worker::extract;

/// Pool of realistic User-Agent strings used when none is configured
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Errors that can occur while fetching a page
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response with status code
    #[error("HTTP error {0}")]
    ServerError(u16),

    /// Request timeout
    #[error("request timeout")]
    Timeout,

    /// Maximum retry attempts exceeded
    #[error("maximum retry attempts exceeded")]
    MaxRetriesExceeded,
}

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User-Agent header; a pool value is rotated in when absent
    pub user_agent: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Maximum requests per second
    pub requests_per_second: u32,

    /// Retry attempts for retryable failures
    pub max_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout: Duration::from_secs(30),
            requests_per_second: 2,
            max_retries: 3,
        }
    }
}

/// HTTP fetcher implementing the fetch collaborator contract
pub struct PageFetcher {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    user_agent: Option<String>,
    max_retries: u32,
    base_delay_ms: u64,
}

impl PageFetcher {
    /// Create a fetcher from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be built
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(config.requests_per_second)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            user_agent: config.user_agent,
            max_retries: config.max_retries,
            base_delay_ms: 1000,
        })
    }

    /// Fetch a page body with rate limiting and retry
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        self.fetch_with_retry(url).await
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay_ms * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let headers = self.build_headers();
            match self.client.get(url).headers(headers).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.text().await?);
                    } else if Self::should_retry(status.as_u16()) {
                        last_error = Some(FetchError::ServerError(status.as_u16()));
                        continue;
                    } else {
                        return Err(FetchError::ServerError(status.as_u16()));
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(FetchError::Timeout);
                    } else {
                        last_error = Some(FetchError::Http(e));
                    }
                }
            }
        }

        Err(last_error.unwrap_or(FetchError::MaxRetriesExceeded))
    }

    /// Retry on throttling and transient server failures only
    fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let user_agent = match &self.user_agent {
            Some(configured) => HeaderValue::from_str(configured)
                .unwrap_or_else(|_| HeaderValue::from_static(USER_AGENTS[0])),
            None => HeaderValue::from_static(Self::random_user_agent()),
        };
        headers.insert(USER_AGENT, user_agent);

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        headers
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
    }
}

#[async_trait]
impl FetchExtract for PageFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Result<Value, FetchError> {
        let html = self.fetch(url).await?;
        let summary = extract::summarize(&html);
        Ok(summary.into_value())
    }
}
