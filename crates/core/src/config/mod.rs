//! Application configuration with layered loading.
//!
//! Sources, lowest to highest precedence:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if REPODEX_CONFIG_FILE set)
//! 3. Environment variables (REPODEX_*)
//!
//! `GITHUB_TOKEN` is honoured when no `REPODEX_GITHUB_TOKEN` is configured.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

const ENV_PREFIX: &str = "REPODEX_";
const CONFIG_FILE_ENV: &str = "REPODEX_CONFIG_FILE";
const FALLBACK_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Application configuration with layered loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// GitHub token sent as a bearer credential. Unauthenticated when absent.
    ///
    /// Set via REPODEX_GITHUB_TOKEN (or GITHUB_TOKEN).
    #[serde(default)]
    pub github_token: Option<String>,

    /// Root of the on-disk cache; each repository gets its own subdirectory.
    ///
    /// Set via REPODEX_CACHE_DIR.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Default repository owner for standalone invocation.
    #[serde(default)]
    pub owner: Option<String>,

    /// Default repository name for standalone invocation.
    #[serde(default)]
    pub repo: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// File extensions to ingest, matched case-insensitively. Empty keeps every file.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_raw_base_url")]
    pub raw_base_url: String,

    /// User-Agent string for HTTP requests. GitHub rejects requests without one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per request, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Waits between attempts in milliseconds; the last entry repeats.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,

    /// Cached documents older than this are refetched. Never expires when unset.
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Default number of search results.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Characters of document text returned per hit by the search tool.
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./.repodex-cache")
}

fn default_branch() -> String {
    "master".into()
}

fn default_extensions() -> Vec<String> {
    vec![".md".into(), ".py".into(), ".yaml".into()]
}

fn default_api_base_url() -> String {
    "https://api.github.com".into()
}

fn default_raw_base_url() -> String {
    "https://raw.githubusercontent.com".into()
}

fn default_user_agent() -> String {
    "repodex/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> Vec<u64> {
    vec![1_000, 2_000, 4_000]
}

fn default_search_limit() -> usize {
    5
}

fn default_preview_chars() -> usize {
    500
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            cache_dir: default_cache_dir(),
            owner: None,
            repo: None,
            branch: default_branch(),
            extensions: default_extensions(),
            api_base_url: default_api_base_url(),
            raw_base_url: default_raw_base_url(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            cache_ttl_secs: None,
            search_limit: default_search_limit(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the config file or environment cannot be
    /// parsed, or validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var(CONFIG_FILE_ENV) {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).map(|key| key.as_str().to_lowercase().into()).split("__"));

        let mut config = Self::from_figment(figment)?;

        if config.github_token.is_none() {
            config.github_token = std::env::var(FALLBACK_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        }

        Ok(config)
    }

    /// Extract and validate configuration from an assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Timeout as Duration for use with reqwest.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Vec<Duration> {
        self.backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    /// Cache TTL as a chrono duration, if configured.
    pub fn cache_ttl(&self) -> Option<chrono::Duration> {
        self.cache_ttl_secs.and_then(|secs| chrono::Duration::try_seconds(i64::try_from(secs).ok()?))
    }

    /// Resolve owner and repo, preferring explicit arguments over configured defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` when neither source provides a value.
    pub fn require_repo(&self, owner: Option<&str>, repo: Option<&str>) -> Result<(String, String), ConfigError> {
        let owner = owner.or(self.owner.as_deref()).filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            ConfigError::Missing { field: "owner".into(), hint: "Pass --owner or set REPODEX_OWNER".into() }
        })?;
        let repo = repo.or(self.repo.as_deref()).filter(|s| !s.trim().is_empty()).ok_or_else(|| {
            ConfigError::Missing { field: "repo".into(), hint: "Pass --repo or set REPODEX_REPO".into() }
        })?;
        Ok((owner.to_string(), repo.to_string()))
    }

    /// Cache directory for one repository branch.
    pub fn repo_cache_dir(&self, owner: &str, repo: &str, branch: &str) -> PathBuf {
        self.cache_dir.join(sanitize_segment(owner)).join(sanitize_segment(repo)).join(sanitize_segment(branch))
    }
}

/// Keep a path component inside the cache root.
fn sanitize_segment(segment: &str) -> String {
    let cleaned: String =
        segment.chars().map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c }).collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".into(),
        _ => cleaned,
    }
}
