//! Configuration constants and URL construction for the Typebot API.

use std::time::Duration;

use crate::error::{Error, Result};

/// Public Typebot cloud API, used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://typebot.io/api/v1";

/// Path suffix appended to instance URLs that carry no API prefix.
pub const DEFAULT_API_SUFFIX: &str = "/api/v1";

/// Maximum number of attempts for retryable requests.
pub const MAX_RETRIES: u32 = 3;

/// Base delay between retry attempts (exponential backoff: delay * 2^attempt).
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connect timeout for HTTP requests.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a whole request/response round-trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Page size used by the results listing unless overridden.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// True when a URL path already ends in `/api` or `/api/v<N>`.
fn has_api_prefix(path: &str) -> bool {
    let mut segments = path.trim_end_matches('/').rsplit('/');
    match segments.next() {
        Some("api") => true,
        Some(last) => {
            let is_version = last.len() > 1
                && last.starts_with('v')
                && last[1..].bytes().all(|b| b.is_ascii_digit());
            is_version && segments.next() == Some("api")
        }
        None => false,
    }
}

/// Normalize an instance base URL.
///
/// Self-hosted deployments differ in whether the configured URL already
/// carries the `/api` or `/api/v1` prefix. URLs ending in `/api` or
/// `/api/vN` are kept; anything else gets `/api/v1` appended.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_BASE_URL.to_string());
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "Unsupported base URL scheme '{}' (expected http or https)",
            parsed.scheme()
        )));
    }

    if has_api_prefix(parsed.path()) {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}{}", trimmed, DEFAULT_API_SUFFIX))
    }
}

/// Percent-encode an identifier for use as a single path segment.
fn encode_segment(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

/// `GET /typebots/{botId}`
pub fn bot_url(base: &str, bot_id: &str) -> String {
    format!("{}/typebots/{}", base, encode_segment(bot_id))
}

/// `GET /typebots/{botId}/results`
pub fn results_url(base: &str, bot_id: &str) -> String {
    format!("{}/results", bot_url(base, bot_id))
}

/// `GET /typebots/{botId}/results/{resultId}`
pub fn result_url(base: &str, bot_id: &str, result_id: &str) -> String {
    format!("{}/{}", results_url(base, bot_id), encode_segment(result_id))
}

/// `POST /typebots/{botId}/startChat`
pub fn start_chat_url(base: &str, bot_id: &str) -> String {
    format!("{}/startChat", bot_url(base, bot_id))
}

/// `POST /sessions/{sessionId}/continueChat`
pub fn continue_chat_url(base: &str, session_id: &str) -> String {
    format!("{}/sessions/{}/continueChat", base, encode_segment(session_id))
}

/// `GET /typebots` (filtered by `workspaceId` / `folderId` query params).
pub fn bots_url(base: &str) -> String {
    format!("{}/typebots", base)
}

/// `GET /workspaces`
pub fn workspaces_url(base: &str) -> String {
    format!("{}/workspaces", base)
}

/// `GET /folders` (filtered by `workspaceId`).
pub fn folders_url(base: &str) -> String {
    format!("{}/folders", base)
}

/// `GET /workspaces/{workspaceId}/folders`, served by some older instances.
pub fn workspace_folders_url(base: &str, workspace_id: &str) -> String {
    format!("{}/{}/folders", workspaces_url(base), encode_segment(workspace_id))
}
