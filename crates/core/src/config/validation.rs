//! Configuration validation rules.

use crate::config::AppConfig;
use thiserror::Error;

const MAX_ATTEMPTS_LIMIT: u32 = 10;
const MAX_BACKOFF_MS: u64 = 60_000;
const MAX_SEARCH_LIMIT: usize = 100;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is below 100ms or above 5 minutes
    /// - `user_agent`, `branch` or a base URL is empty
    /// - `max_attempts` is outside 1..=10
    /// - any backoff entry exceeds 60s
    /// - `search_limit` is outside 1..=100
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.trim().is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }
        if self.branch.trim().is_empty() {
            return Err(invalid("branch", "must not be empty"));
        }
        for (field, url) in [("api_base_url", &self.api_base_url), ("raw_base_url", &self.raw_base_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(field, "must be an http(s) URL"));
            }
        }

        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(invalid("max_attempts", format!("must be between 1 and {MAX_ATTEMPTS_LIMIT}")));
        }
        if self.backoff_ms.iter().any(|ms| *ms > MAX_BACKOFF_MS) {
            return Err(invalid("backoff_ms", format!("entries must not exceed {MAX_BACKOFF_MS}ms")));
        }

        if self.search_limit == 0 || self.search_limit > MAX_SEARCH_LIMIT {
            return Err(invalid("search_limit", format!("must be between 1 and {MAX_SEARCH_LIMIT}")));
        }

        if self.extensions.is_empty() {
            tracing::warn!("extensions is empty; every file in the tree will be ingested");
        }

        Ok(())
    }
}
