//! HTTP client with retry logic for the Typebot API.

use std::time::Duration;

use reqwest::Method;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{BASE_RETRY_DELAY, CONNECT_TIMEOUT, MAX_RETRIES, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use crate::transport::headers::{self, Credentials};

/// Backoff settings for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `base_delay * 2^(n-1)`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: BASE_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// HTTP client for the Typebot API with retry logic.
///
/// Retry strategy:
/// - 401 / 404: never retried, surfaced as [`Error::Auth`] / [`Error::NotFound`]
/// - 429 Too Many Requests: backoff (honours `Retry-After`), for every method
/// - 5xx and connection failures: backoff, for GET only. POSTs mutate the
///   remote session, so a server error is returned instead of re-submitting.
pub struct TypebotHttpClient {
    client: reqwest::Client,
    credentials: RwLock<Credentials>,
    retry: RetryPolicy,
}

impl TypebotHttpClient {
    /// Create a new HTTP client with the given request timeout.
    pub fn new(credentials: Credentials, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()
            .map_err(Error::Network)?;

        Ok(Self::with_client(client, credentials))
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials: RwLock::new(credentials),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Swap the bearer token, e.g. after an [`Error::Auth`].
    pub async fn set_auth_token(&self, token: impl Into<String>) {
        let mut creds = self.credentials.write().await;
        creds.auth_token = token.into();
        info!(token = %headers::mask_token(&creds.auth_token), "Auth token replaced");
    }

    /// Send a GET request and decode the JSON body.
    pub async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        resource: &str,
    ) -> Result<serde_json::Value> {
        self.send(Method::GET, url, params, None, resource).await
    }

    /// Send a POST request with a JSON body and decode the JSON response.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        resource: &str,
    ) -> Result<serde_json::Value> {
        self.send(Method::POST, url, &[], Some(body), resource).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, String)],
        body: Option<&serde_json::Value>,
        resource: &str,
    ) -> Result<serde_json::Value> {
        let idempotent = method == Method::GET;
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error: Option<Error> = None;
        let mut retry_after: Option<Duration> = None;
        let mut last_status: Option<u16> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = retry_after.take().unwrap_or_else(|| self.retry.delay_for(attempt));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying request");
                tokio::time::sleep(delay).await;
            }

            let hdrs = headers::api_headers(&*self.credentials.read().await);
            let mut request = self.client.request(method.clone(), url).headers(hdrs);
            if !params.is_empty() {
                request = request.query(params);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, url, "Sending request");

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    // A connect failure never reached the server, so even a
                    // POST is safe to repeat.
                    let retryable = idempotent || e.is_connect();
                    let err = if e.is_timeout() { Error::Timeout } else { Error::Network(e) };
                    if !retryable {
                        return Err(err);
                    }
                    warn!(attempt = attempt + 1, error = %err, "Request failed");
                    last_status = None;
                    last_error = Some(err);
                    continue;
                }
            };

            let status = response.status().as_u16();
            last_status = Some(status);
            if response.status().is_success() {
                let text = response.text().await.map_err(Error::Network)?;
                if text.trim().is_empty() {
                    return Ok(serde_json::Value::Null);
                }
                return Ok(serde_json::from_str(&text)?);
            }

            match status {
                401 => {
                    let message = response.text().await.unwrap_or_default();
                    warn!(url, "Got 401 - token expired or invalid");
                    return Err(Error::Auth { message });
                }
                404 => {
                    debug!(url, resource, "Got 404");
                    return Err(Error::not_found(resource));
                }
                429 => {
                    retry_after = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    info!(delay_secs = retry_after.map(|d| d.as_secs()), "Rate limited, backing off");
                    last_error = Some(Error::RateLimited { retry_after });
                }
                500..=599 if idempotent => {
                    let message = response.text().await.unwrap_or_default();
                    warn!(status, body = message.as_str(), "Server error, retrying");
                    last_error = Some(Error::Api { status, message });
                }
                _ => {
                    let message = response.text().await.unwrap_or_default();
                    return Err(Error::Api { status, message });
                }
            }
        }

        Err(Error::RetriesExhausted {
            attempts,
            status: last_status,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".into()),
        })
    }
}

impl std::fmt::Debug for TypebotHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypebotHttpClient")
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }
}
