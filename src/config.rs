use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use typebot_client::config::DEFAULT_PAGE_SIZE;
use typebot_client::transport::headers::mask_token;
use typebot_client::{ResultsQuery, RetryPolicy, TimeFilter, TypebotClient};

use crate::error::{HarvestError, Result};

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings were overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub results: ResultsConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Instance URL; `/api/v1` is appended when missing.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Default bot for single-bot commands.
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub referer: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            bot_id: None,
            workspace_id: None,
            origin: None,
            referer: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_deref().map(mask_token))
            .field("bot_id", &self.bot_id)
            .field("workspace_id", &self.workspace_id)
            .field("origin", &self.origin)
            .field("referer", &self.referer)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Per-bot structure dumps and the inventory.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Timestamped CSV exports.
    #[serde(default = "default_db_dir")]
    pub db_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            db_dir: default_db_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultsConfig {
    #[serde(default = "default_time_filter")]
    pub time_filter: TimeFilter,
    /// Also walk the archived listing and merge it in.
    #[serde(default = "default_true")]
    pub include_archived: bool,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            time_filter: default_time_filter(),
            include_archived: true,
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedConfig {
    /// CSV columns sent as prefilled variables instead of answers.
    #[serde(default = "default_prefill_columns")]
    pub prefill_columns: Vec<String>,
    #[serde(default)]
    pub turn_delay_ms: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            prefill_columns: default_prefill_columns(),
            turn_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_timeout_secs() -> u64 {
    60
}
const fn default_max_retries() -> u32 {
    3
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_db_dir() -> PathBuf {
    PathBuf::from("DB")
}
const fn default_time_filter() -> TimeFilter {
    TimeFilter::AllTime
}
const fn default_true() -> bool {
    true
}
const fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}
fn default_prefill_columns() -> Vec<String> {
    vec!["Name".to_string(), "Phone".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. A missing file falls back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;
            toml::from_str::<Config>(&content)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// The connection settings keep the plain names the `.env` files use
    /// (`BOT_ID`, `AUTH_TOKEN`, ...); everything else is `HARVEST_*`.
    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.trim().parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }
        macro_rules! env_path {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_opt_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    let val = val.trim().to_string();
                    $field = if val.is_empty() { None } else { Some(val) };
                    ov.record($key, $env);
                }
            };
        }

        // -- API --
        if std::env::var_os("BASE_URL").is_some() {
            env_opt_str!("api.base_url", "BASE_URL", self.api.base_url);
        } else {
            env_opt_str!("api.base_url", "API_BASE_URL", self.api.base_url);
        }
        env_opt_str!("api.auth_token", "AUTH_TOKEN", self.api.auth_token);
        env_opt_str!("api.bot_id", "BOT_ID", self.api.bot_id);
        env_opt_str!("api.workspace_id", "WORKSPACE_ID", self.api.workspace_id);
        env_opt_str!("api.origin", "TYPEBOT_ORIGIN", self.api.origin);
        env_opt_str!("api.referer", "TYPEBOT_REFERER", self.api.referer);
        env_parse!("api.timeout_secs", "HARVEST_API_TIMEOUT_SECS", self.api.timeout_secs);
        env_parse!("api.max_retries", "HARVEST_API_MAX_RETRIES", self.api.max_retries);

        // -- Output --
        env_path!("output.dir", "HARVEST_OUTPUT_DIR", self.output.dir);
        env_path!("output.db_dir", "HARVEST_DB_DIR", self.output.db_dir);

        // -- Results --
        env_parse!("results.time_filter", "HARVEST_TIME_FILTER", self.results.time_filter);
        env_bool!(
            "results.include_archived",
            "HARVEST_INCLUDE_ARCHIVED",
            self.results.include_archived
        );
        env_parse!("results.page_size", "HARVEST_PAGE_SIZE", self.results.page_size);

        // -- Seed --
        if let Ok(val) = std::env::var("HARVEST_PREFILL_COLUMNS") {
            self.seed.prefill_columns = split_list(&val);
            ov.record("seed.prefill_columns", "HARVEST_PREFILL_COLUMNS");
        }
        env_parse!("seed.turn_delay_ms", "HARVEST_TURN_DELAY_MS", self.seed.turn_delay_ms);

        // -- Logging --
        if let Ok(val) = std::env::var("HARVEST_LOG_LEVEL") {
            self.logging.level = val;
            ov.record("logging.level", "HARVEST_LOG_LEVEL");
        }
        env_bool!("logging.json", "HARVEST_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }

    /// Re-read `AUTH_TOKEN` from `.env` and the environment.
    ///
    /// Returns the new token only when it differs from the current one.
    pub fn reload_auth_token(&mut self) -> Option<String> {
        if let Err(e) = dotenvy::dotenv_override() {
            tracing::debug!(error = %e, "No .env file reloaded");
        }
        let fresh = std::env::var("AUTH_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())?;

        if self.api.auth_token.as_deref() == Some(fresh.as_str()) {
            return None;
        }
        self.api.auth_token = Some(fresh.clone());
        self.env_overrides.record("api.auth_token", "AUTH_TOKEN");
        Some(fresh)
    }

    /// Build an API client from the `[api]` section.
    pub fn build_client(&self) -> Result<TypebotClient> {
        let token = self
            .api
            .auth_token
            .as_deref()
            .ok_or_else(|| HarvestError::Config("AUTH_TOKEN is not set".into()))?;

        let mut builder = TypebotClient::builder()
            .auth_token(token)
            .timeout(Duration::from_secs(self.api.timeout_secs))
            .retry_policy(RetryPolicy {
                max_attempts: self.api.max_retries.max(1),
                ..RetryPolicy::default()
            });
        if let Some(url) = &self.api.base_url {
            builder = builder.base_url(url);
        }
        if let Some(origin) = &self.api.origin {
            builder = builder.origin(origin);
        }
        if let Some(referer) = &self.api.referer {
            builder = builder.referer(referer);
        }
        Ok(builder.build()?)
    }

    /// Resolve the bot to operate on: explicit argument first, then `BOT_ID`.
    pub fn bot_id(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| self.api.bot_id.clone())
            .ok_or_else(|| HarvestError::Config("no bot given and BOT_ID is not set".into()))
    }

    /// Filter sets walked by an export: the configured window, then the
    /// archived listing when enabled.
    pub fn result_queries(&self) -> Vec<ResultsQuery> {
        let base = ResultsQuery::new()
            .time_filter(self.results.time_filter)
            .limit(self.results.page_size);
        let mut queries = vec![base.clone()];
        if self.results.include_archived {
            queries.push(base.archived(true));
        }
        queries
    }

    pub fn turn_delay(&self) -> Duration {
        Duration::from_millis(self.seed.turn_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: &[&str] = &[
        "BASE_URL",
        "API_BASE_URL",
        "AUTH_TOKEN",
        "BOT_ID",
        "WORKSPACE_ID",
        "HARVEST_PAGE_SIZE",
        "HARVEST_INCLUDE_ARCHIVED",
        "HARVEST_TIME_FILTER",
        "HARVEST_PREFILL_COLUMNS",
        "HARVEST_LOG_JSON",
        "HARVEST_LOG_LEVEL",
    ];

    fn clear_env() {
        // SAFETY: env-mutating tests are serialized.
        unsafe {
            for var in ENV_VARS {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.api.base_url.is_none());
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.output.dir, PathBuf::from("output"));
        assert_eq!(config.output.db_dir, PathBuf::from("DB"));
        assert_eq!(config.results.time_filter, TimeFilter::AllTime);
        assert!(config.results.include_archived);
        assert_eq!(config.results.page_size, 100);
        assert_eq!(config.seed.prefill_columns, vec!["Name", "Phone"]);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    #[serial]
    fn test_env_override_applies() {
        clear_env();
        // SAFETY: env-mutating tests are serialized.
        unsafe {
            std::env::set_var("BOT_ID", "b1");
            std::env::set_var("AUTH_TOKEN", "secret-token-1234");
            std::env::set_var("HARVEST_PAGE_SIZE", "25");
            std::env::set_var("HARVEST_INCLUDE_ARCHIVED", "no");
            std::env::set_var("HARVEST_TIME_FILTER", "last-7-days");
            std::env::set_var("HARVEST_PREFILL_COLUMNS", "Name, Email ,");
        }

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.api.bot_id.as_deref(), Some("b1"));
        assert_eq!(config.api.auth_token.as_deref(), Some("secret-token-1234"));
        assert_eq!(config.results.page_size, 25);
        assert!(!config.results.include_archived);
        assert_eq!(config.results.time_filter, TimeFilter::Last7Days);
        assert_eq!(config.seed.prefill_columns, vec!["Name", "Email"]);

        assert_eq!(config.env_overrides.env_var_for("api.bot_id"), Some("BOT_ID"));
        assert_eq!(config.env_overrides.env_var_for("results.page_size"), Some("HARVEST_PAGE_SIZE"));
        assert!(config.env_overrides.env_var_for("api.workspace_id").is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_reload_auth_token_only_reports_changes() {
        clear_env();
        let mut config = Config::default();
        config.api.auth_token = Some("old-token".into());

        assert!(config.reload_auth_token().is_none());

        // SAFETY: env-mutating tests are serialized.
        unsafe { std::env::set_var("AUTH_TOKEN", "old-token") };
        assert!(config.reload_auth_token().is_none());
        assert!(config.env_overrides.env_var_for("api.auth_token").is_none());

        unsafe { std::env::set_var("AUTH_TOKEN", "new-token") };
        assert_eq!(config.reload_auth_token().as_deref(), Some("new-token"));
        assert_eq!(config.api.auth_token.as_deref(), Some("new-token"));
        assert_eq!(config.env_overrides.env_var_for("api.auth_token"), Some("AUTH_TOKEN"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_base_url_alias() {
        clear_env();
        unsafe { std::env::set_var("API_BASE_URL", "https://bots.example.com"); }
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.api.base_url.as_deref(), Some("https://bots.example.com"));
        assert_eq!(config.env_overrides.env_var_for("api.base_url"), Some("API_BASE_URL"));

        // BASE_URL wins over the alias.
        unsafe { std::env::set_var("BASE_URL", "https://primary.example.com"); }
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.api.base_url.as_deref(), Some("https://primary.example.com"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_bool_variants() {
        clear_env();
        for (val, expected) in [("1", true), ("on", true), ("0", false), ("off", false)] {
            unsafe { std::env::set_var("HARVEST_LOG_JSON", val); }
            let mut config = Config::default();
            config.apply_env_overrides();
            assert_eq!(config.logging.json, expected, "HARVEST_LOG_JSON={val}");
        }
        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_load_from_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://bots.example.com"
bot_id = "b7"
max_retries = 5

[results]
time_filter = "last30Days"
include_archived = false

[seed]
prefill_columns = ["Name"]
turn_delay_ms = 250

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.bot_id.as_deref(), Some("b7"));
        assert_eq!(config.api.max_retries, 5);
        assert_eq!(config.results.time_filter, TimeFilter::Last30Days);
        assert_eq!(config.result_queries().len(), 1);
        assert_eq!(config.turn_delay(), Duration::from_millis(250));
        assert!(config.logging.json);
    }

    #[test]
    #[serial]
    fn test_config_load_missing_file() {
        clear_env();
        let config = Config::load(Path::new("/tmp/nonexistent_typebot_harvest.toml")).unwrap();
        assert_eq!(config.results.page_size, 100);
    }

    #[test]
    fn test_config_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[results]\npage_size = \"many\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, HarvestError::Toml(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_result_queries_include_archived_set() {
        let config = Config::default();
        let queries = config.result_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].archived, None);
        assert_eq!(queries[1].archived, Some(true));
        assert!(queries.iter().all(|q| q.time_filter == Some(TimeFilter::AllTime)));
        assert!(queries.iter().all(|q| q.limit == Some(100)));
    }

    #[test]
    fn test_build_client_requires_token() {
        let config = Config::default();
        let err = config.build_client().unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));

        let mut config = Config::default();
        config.api.auth_token = Some("tok".into());
        config.api.base_url = Some("https://bots.example.com".into());
        let client = config.build_client().unwrap();
        assert_eq!(client.base_url(), "https://bots.example.com/api/v1");
    }

    #[test]
    fn test_bot_id_resolution() {
        let mut config = Config::default();
        assert!(config.bot_id(None).is_err());
        config.api.bot_id = Some("env-bot".into());
        assert_eq!(config.bot_id(None).unwrap(), "env-bot");
        assert_eq!(config.bot_id(Some("flag-bot")).unwrap(), "flag-bot");
    }

    #[test]
    fn test_debug_masks_token() {
        let mut config = Config::default();
        config.api.auth_token = Some("super-secret-token-abcd".into());
        let rendered = format!("{:?}", config.api);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("****abcd"));
    }
}
