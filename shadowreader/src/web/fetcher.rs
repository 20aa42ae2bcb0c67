//! HTTP page fetching.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::{FetchConfig, RetryConfig};
use crate::errors::{NetworkError, ReaderError};

/// Fetches a page and returns its decoded body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url`, failing with [`ReaderError::Network`].
    async fn fetch(&self, url: &str) -> Result<String, ReaderError>;
}

/// A reqwest-backed fetcher with timeout and retry.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Builds a client from fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self, ReaderError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| ReaderError::InvalidConfig(format!("header name '{key}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ReaderError::InvalidConfig(format!("header value for '{key}': {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .map_err(|e| ReaderError::InvalidConfig(format!("http client: {e}")))?;

        Ok(Self {
            client,
            retry: config.retry.clone(),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, NetworkError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::new(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| NetworkError::new(url, e.to_string()))
    }

    fn should_retry(&self, err: &NetworkError, attempt: usize) -> bool {
        if attempt >= self.retry.max_retries {
            return false;
        }
        match err.status {
            Some(status) => self.retry.should_retry_status(status),
            None => err.retryable,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ReaderError> {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(
                        url,
                        attempt,
                        bytes = body.len(),
                        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "Fetched page"
                    );
                    return Ok(body);
                }
                Err(err) if self.should_retry(&err, attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(url, attempt, error = %err, delay_ms = delay.as_secs_f64() * 1000.0, "Retrying fetch");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
