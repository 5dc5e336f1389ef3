//! HTTP requests with bounded exponential-backoff retries.
//!
//! A request is retried when the server answers 429 or 5xx, or when no
//! response arrives at all (connect failure, reset, timeout). The delay before
//! retry `n` (0-based) is `base_delay * 2^n`, without jitter or cap.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Response, StatusCode};
use tracing::debug;

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Retry budget shared by every request a [`RetryingClient`] sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// 429, or a status in `500..599`.
    fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || (500..599).contains(&status.as_u16())
    }
}

/// Description of a request that can be rebuilt for every attempt.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    /// Per-attempt deadline covering the whole exchange, body included.
    /// `None` leaves the request unbounded, which long-lived streams need.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    #[must_use]
    fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn bearer_auth(self, token: &str) -> Result<Self> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::Config("bearer token contains invalid header characters".into()))?;
        value.set_sensitive(true);
        Ok(self.header(AUTHORIZATION, value))
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(config: &HttpConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .user_agent(concat!("tweetstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            policy: config.retry_policy(),
        }
    }

    pub fn with_client(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Sends `request`, retrying per the client's [`RetryPolicy`], and returns
    /// the first 2xx response.
    pub async fn send(&self, request: &HttpRequest) -> Result<Response> {
        let mut attempt = 0;

        loop {
            match self.build(request).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if RetryPolicy::is_retryable_status(status) && self.policy.can_retry(attempt) {
                        let delay = self.policy.delay_for_attempt(attempt);
                        debug!(
                            url = %request.url,
                            attempt = attempt + 1,
                            max_retries = self.policy.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            status = %status,
                            "Retrying request"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(Error::Status {
                        url: request.url.clone(),
                        status: status.as_u16(),
                        status_text: status.canonical_reason().unwrap_or_default().to_string(),
                    });
                }
                Err(source) => {
                    if self.policy.can_retry(attempt) {
                        let delay = self.policy.delay_for_attempt(attempt);
                        debug!(
                            url = %request.url,
                            attempt = attempt + 1,
                            max_retries = self.policy.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %source,
                            "Retrying request after transport failure"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(Error::Transport {
                        url: request.url.clone(),
                        source,
                    });
                }
            }
        }
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}
