//! Main client entry point.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::chat::ChatSession;
use crate::api::results::ResultPager;
use crate::config;
use crate::error::{Error, Result};
use crate::models::bot::BotDefinition;
use crate::models::chat::{ChatState, PrefilledVariables, SessionId};
use crate::models::result::{ResultPage, ResultRecord, ResultsQuery};
use crate::models::workspace::{BotSummary, Folder, Workspace};
use crate::transport::headers::Credentials;
use crate::transport::http::{RetryPolicy, TypebotHttpClient};

/// Typebot API client.
///
/// # Examples
///
/// ```rust,no_run
/// use typebot_client::{ResultsQuery, TimeFilter, TypebotClient};
///
/// # async fn example() -> typebot_client::Result<()> {
/// let client = TypebotClient::builder()
///     .base_url("https://bots.example.com")
///     .auth_token("my-token")
///     .build()?;
///
/// let names = client.fetch_bot_definition("b1").await?.variable_names();
/// let query = ResultsQuery::new().time_filter(TimeFilter::AllTime);
/// for record in client.fetch_all_results("b1", &query).await? {
///     for var in &record.variables {
///         let id = var.id.as_deref().unwrap_or_default();
///         println!("{} = {}", names.resolve(id), var.value);
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TypebotClient {
    http: Arc<TypebotHttpClient>,
    base_url: String,
}

impl TypebotClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> TypebotClientBuilder {
        TypebotClientBuilder::new()
    }

    /// Normalized API base URL (always carries the `/api` prefix).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Replace the bearer token used by every subsequent request.
    pub async fn set_auth_token(&self, token: impl Into<String>) {
        self.http.set_auth_token(token).await;
    }

    /// Fetch the bot structure.
    pub async fn fetch_bot_definition(&self, bot_id: &str) -> Result<BotDefinition> {
        crate::api::bots::fetch_bot_definition(&self.http, &self.base_url, bot_id).await
    }

    /// Fetch a single page of results.
    pub async fn fetch_results_page(
        &self,
        bot_id: &str,
        cursor: Option<&str>,
        query: &ResultsQuery,
    ) -> Result<ResultPage> {
        crate::api::results::fetch_results_page(&self.http, &self.base_url, bot_id, cursor, query)
            .await
    }

    /// Walk a bot's results page by page.
    pub fn result_pager(&self, bot_id: impl Into<String>, query: ResultsQuery) -> ResultPager<'_> {
        ResultPager::new(self, bot_id, query)
    }

    /// Fetch every result of a bot for the given query, without duplicates.
    pub async fn fetch_all_results(
        &self,
        bot_id: &str,
        query: &ResultsQuery,
    ) -> Result<Vec<ResultRecord>> {
        self.result_pager(bot_id, query.clone()).collect_all().await
    }

    /// Fetch one result.
    pub async fn fetch_result(&self, bot_id: &str, result_id: &str) -> Result<ResultRecord> {
        crate::api::results::fetch_result(&self.http, &self.base_url, bot_id, result_id).await
    }

    /// Start a chat session, optionally with prefilled variables.
    pub async fn start_chat(
        &self,
        bot_id: &str,
        prefilled: &PrefilledVariables,
    ) -> Result<ChatSession> {
        let response =
            crate::api::chat::start_chat(&self.http, &self.base_url, bot_id, prefilled).await?;
        Ok(ChatSession::from_start(response))
    }

    /// Submit one answer to a session.
    pub async fn continue_chat(&self, session_id: &SessionId, value: &str) -> Result<ChatState> {
        crate::api::chat::continue_chat(&self.http, &self.base_url, session_id, value).await
    }

    /// List workspaces visible to the token.
    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        crate::api::workspaces::list_workspaces(&self.http, &self.base_url).await
    }

    /// List folders of a workspace.
    pub async fn list_folders(&self, workspace_id: &str) -> Result<Vec<Folder>> {
        crate::api::workspaces::list_folders(&self.http, &self.base_url, workspace_id).await
    }

    /// List bots at the workspace root (`folder_id = None`) or in a folder.
    pub async fn list_bots(
        &self,
        workspace_id: &str,
        folder_id: Option<&str>,
    ) -> Result<Vec<BotSummary>> {
        crate::api::workspaces::list_bots(&self.http, &self.base_url, workspace_id, folder_id)
            .await
    }
}

/// Builder for [`TypebotClient`].
#[derive(Default)]
pub struct TypebotClientBuilder {
    base_url: Option<String>,
    auth_token: Option<String>,
    origin: Option<String>,
    referer: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    reqwest_client: Option<reqwest::Client>,
}

impl TypebotClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate unset fields from `BASE_URL` (or `API_BASE_URL`),
    /// `AUTH_TOKEN`, `TYPEBOT_ORIGIN` and `TYPEBOT_REFERER`.
    pub fn from_env(mut self) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if self.base_url.is_none() {
            self.base_url = var("BASE_URL").or_else(|| var("API_BASE_URL"));
        }
        if self.auth_token.is_none() {
            self.auth_token = var("AUTH_TOKEN");
        }
        if self.origin.is_none() {
            self.origin = var("TYPEBOT_ORIGIN");
        }
        if self.referer.is_none() {
            self.referer = var("TYPEBOT_REFERER");
        }
        self
    }

    /// Instance URL, with or without the `/api/v1` suffix.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bearer token.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// `Origin` header override for restrictive CORS setups.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// `Referer` header override for restrictive CORS setups.
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Request timeout (default 60s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry policy for transient failures.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Set a custom reqwest client.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Build the client, validating the base URL and credentials.
    pub fn build(self) -> Result<TypebotClient> {
        let auth_token = self
            .auth_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("AUTH_TOKEN is not set".into()))?;
        let base_url =
            config::normalize_base_url(self.base_url.as_deref().unwrap_or(config::DEFAULT_BASE_URL))?;

        let credentials = Credentials {
            auth_token,
            origin: self.origin,
            referer: self.referer,
        };

        let http = match self.reqwest_client {
            Some(client) => TypebotHttpClient::with_client(client, credentials),
            None => TypebotHttpClient::new(credentials, self.timeout)?,
        };
        let http = http.with_retry(self.retry.unwrap_or_default());

        info!(base_url = base_url.as_str(), "TypebotClient initialized");
        Ok(TypebotClient {
            http: Arc::new(http),
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_token() {
        let err = TypebotClient::builder().base_url("https://h").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = TypebotClient::builder().auth_token("  ").build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_normalizes_base_url() {
        let client = TypebotClient::builder()
            .base_url("https://bots.example.com/")
            .auth_token("tok")
            .build()
            .unwrap();
        assert_eq!(client.base_url(), "https://bots.example.com/api/v1");

        let client = TypebotClient::builder().auth_token("tok").build().unwrap();
        assert_eq!(client.base_url(), config::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_build_rejects_invalid_base_url() {
        let result = TypebotClient::builder()
            .base_url("ftp://nope")
            .auth_token("tok")
            .build();
        assert!(result.is_err());
    }
}
