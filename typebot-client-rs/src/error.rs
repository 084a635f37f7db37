//! Error types for typebot-client.

use std::time::Duration;
use thiserror::Error;

/// The main error type for typebot-client.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ───────────────────────────────────────────────────────
    /// The bearer token was rejected (HTTP 401): expired, revoked or mistyped.
    #[error("Authentication failed: {message}")]
    Auth {
        /// Error message from the API.
        message: String,
    },

    // ── API ──────────────────────────────────────────────────────────────────
    /// The bot, result or session identifier does not exist (HTTP 404).
    #[error("Not found: {resource}")]
    NotFound {
        /// Human-readable description of what was requested (e.g. `session s1`).
        resource: String,
    },

    /// API returned any other error response.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited by the API.
    #[error("Rate limited - retry after {retry_after:?}")]
    RateLimited {
        /// Suggested retry delay, if provided.
        retry_after: Option<Duration>,
    },

    /// All retry attempts exhausted.
    #[error("Request failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// HTTP status of the last attempt; `None` when it never got a response.
        status: Option<u16>,
        /// Description of the last error.
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,
}

impl Error {
    /// Returns true if the credentials need to be refreshed before retrying.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }

    /// Returns true if the bot/result/session identifier was wrong.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true for transient failures worth retrying with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::RateLimited { .. } | Error::Timeout => true,
            Error::Api { status, .. } => (500..=599).contains(status),
            Error::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }

    /// Creates a not-found error for the given resource description.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::Auth { message: "expired".into() }.is_auth());
        assert!(!Error::not_found("bot b1").is_auth());
        assert!(Error::not_found("bot b1").is_not_found());

        assert!(Error::Api { status: 502, message: "bad gateway".into() }.is_retryable());
        assert!(Error::RateLimited { retry_after: None }.is_retryable());
        assert!(!Error::Api { status: 400, message: "bad".into() }.is_retryable());
        assert!(!Error::not_found("session s1").is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::not_found("session s9");
        assert_eq!(err.to_string(), "Not found: session s9");

        let err = Error::Api { status: 429, message: "Too many requests".into() };
        assert_eq!(err.to_string(), "API error 429: Too many requests");
    }
}
