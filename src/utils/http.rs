// src/utils/http.rs

//! HTTP client utilities.
//!
//! Every request goes through the shared [`RateLimiter`] and is retried with
//! exponential backoff on timeouts, connection failures, 5xx and 429.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;
use crate::utils::rate_limit::RateLimiter;

/// Longest wait honored from a `Retry-After` header.
const MAX_RETRY_AFTER_SECS: u64 = 10;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// Rate-limited HTTP fetcher with retry.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpFetcher {
    /// Create a fetcher sharing the given limiter.
    pub fn new(config: &HttpConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            limiter,
            max_retries: config.max_retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        })
    }

    /// GET a URL and return the body text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(url, || self.client.get(url)).await?;
        Ok(response.text().await?)
    }

    /// GET a URL with query parameters and return the body text.
    pub async fn get_text_with_query(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self.send(url, || self.client.get(url).query(query)).await?;
        Ok(response.text().await?)
    }

    /// GET a URL and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let body = self.get_text_with_query(url, query).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self.send(url, || self.client.post(url).json(body)).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt)
    }

    /// Send a request, retrying transient failures.
    async fn send(&self, url: &str, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0u32;

        loop {
            self.limiter.acquire(url).await;
            let can_retry = attempt < self.max_retries;

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    if can_retry && status == StatusCode::TOO_MANY_REQUESTS {
                        let delay = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
                            .unwrap_or_else(|| self.backoff(attempt));
                        log::debug!("429 from {}, retrying in {:?}", url, delay);
                        tokio::time::sleep(delay).await;
                    } else if can_retry && status.is_server_error() {
                        let delay = self.backoff(attempt);
                        log::debug!("{} from {}, retrying in {:?}", status, url, delay);
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(AppError::Status {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
                Err(error) if error.is_timeout() || error.is_connect() => {
                    if !can_retry {
                        if error.is_timeout() {
                            return Err(AppError::RetrievalTimeout {
                                url: url.to_string(),
                                attempts: attempt + 1,
                            });
                        }
                        return Err(AppError::Http(error));
                    }
                    let delay = self.backoff(attempt);
                    log::debug!("{} failed ({}), retrying in {:?}", url, error, delay);
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(AppError::Http(error)),
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
impl HttpFetcher {
    /// Unthrottled fetcher with millisecond backoff.
    pub(crate) fn for_tests() -> Self {
        let config = HttpConfig {
            timeout_secs: 5,
            backoff_base_ms: 1,
            ..HttpConfig::default()
        };
        Self::new(&config, Arc::new(RateLimiter::unlimited())).unwrap()
    }
}
