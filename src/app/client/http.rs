//! Core HTTP operations with rate limiting and retry logic
//!
//! Every outgoing request waits for the rate limiter, then retries with
//! exponential backoff when the server answers 429 or 503 or the transport
//! fails.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use url::Url;

use crate::errors::{FetchError, FetchResult};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Backoff settings applied to retried requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(retry))
    }
}

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectLimiter,
    retry: RetryPolicy,
}

impl HttpHandler {
    /// Handler allowing `rate_limit_rps` requests per second
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Configuration` if the rate is zero
    pub fn per_second(client: Client, rate_limit_rps: u32, retry: RetryPolicy) -> FetchResult<Self> {
        let quota = Quota::per_second(Self::non_zero(rate_limit_rps)?);
        Ok(Self::with_quota(client, quota, retry))
    }

    /// Handler allowing `requests_per_minute` requests per minute
    pub fn per_minute(
        client: Client,
        requests_per_minute: u32,
        retry: RetryPolicy,
    ) -> FetchResult<Self> {
        let quota = Quota::per_minute(Self::non_zero(requests_per_minute)?);
        Ok(Self::with_quota(client, quota, retry))
    }

    fn with_quota(client: Client, quota: Quota, retry: RetryPolicy) -> Self {
        Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            retry,
        }
    }

    fn non_zero(rate: u32) -> FetchResult<NonZeroU32> {
        NonZeroU32::new(rate)
            .ok_or_else(|| FetchError::Configuration("Rate limit must be non-zero".to_string()))
    }

    /// GET `url` with rate limiting and retries
    pub async fn get(&self, url: &Url) -> FetchResult<Response> {
        self.send(url, || self.client.get(url.as_str())).await
    }

    /// Send the request produced by `build`, retrying transient failures
    ///
    /// Every attempt, retries included, waits for the rate limiter.
    ///
    /// `build` is called once per attempt, so request bodies that cannot be
    /// cloned (multipart forms) are rebuilt for every retry.
    ///
    /// Non-success statuses other than 429 and 503 are returned as-is for
    /// the caller to interpret.
    pub async fn send<F>(&self, url: &Url, build: F) -> FetchResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        loop {
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        if retries < self.retry.max_retries {
                            retries += 1;
                            let delay = self.retry.delay_for(retries);
                            tracing::warn!(
                                "Server answered {} for {}. Backing off for {}ms",
                                status.as_u16(),
                                url,
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                            FetchError::RateLimitExceeded
                        } else {
                            FetchError::ServerOverloaded
                        });
                    }

                    tracing::debug!("Received HTTP {} from {}", status.as_u16(), url);
                    return Ok(response);
                }
                Err(e) if retries < self.retry.max_retries => {
                    retries += 1;
                    let delay = self.retry.delay_for(retries);
                    tracing::warn!(
                        "Request failed (attempt {}/{}): {}. Retrying in {}ms",
                        retries,
                        self.retry.max_retries,
                        transport_message(e),
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(
                        "Request to {} failed after {} retries: {}",
                        url,
                        self.retry.max_retries,
                        transport_message(e)
                    );
                    return Err(FetchError::MaxRetriesExceeded {
                        url: url.to_string(),
                        max_retries: self.retry.max_retries,
                    });
                }
            }
        }
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Error text without the request URL, whose query may carry credentials
fn transport_message(error: reqwest::Error) -> String {
    error.without_url().to_string()
}
