//! Typebot API header construction.

use reqwest::header::{HeaderMap, HeaderValue};

/// Bearer token plus the optional CORS overrides some self-hosted
/// deployments require.
#[derive(Clone, Default)]
pub struct Credentials {
    pub auth_token: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
}

impl Credentials {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            origin: None,
            referer: None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_token", &mask_token(&self.auth_token))
            .field("origin", &self.origin)
            .field("referer", &self.referer)
            .finish()
    }
}

/// Keep the last four characters of a secret for log correlation.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

/// Build the standard headers for Typebot API requests.
pub fn api_headers(credentials: &Credentials) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        reqwest::header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", credentials.auth_token))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer invalid")),
    );

    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static("application/json"),
    );

    headers.insert(
        reqwest::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_str(&format!("typebot-client/{}", env!("CARGO_PKG_VERSION")))
            .unwrap_or_else(|_| HeaderValue::from_static("typebot-client")),
    );

    if let Some(origin) = credentials.origin.as_deref() {
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(reqwest::header::ORIGIN, value);
        }
    }

    if let Some(referer) = credentials.referer.as_deref() {
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(reqwest::header::REFERER, value);
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let headers = api_headers(&Credentials::new("tok-123"));
        assert_eq!(headers.get("authorization").unwrap(), "Bearer tok-123");
        assert!(headers.get("origin").is_none());
        assert!(headers.get("referer").is_none());
    }

    #[test]
    fn test_cors_overrides() {
        let creds = Credentials {
            auth_token: "tok".into(),
            origin: Some("https://builder.example.com".into()),
            referer: Some("https://builder.example.com/".into()),
        };
        let headers = api_headers(&creds);
        assert_eq!(headers.get("origin").unwrap(), "https://builder.example.com");
        assert_eq!(headers.get("referer").unwrap(), "https://builder.example.com/");
    }

    #[test]
    fn test_debug_masks_token() {
        let creds = Credentials::new("super-secret-token-abcd");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("****abcd"));
        assert_eq!(mask_token("short"), "****");
    }
}
