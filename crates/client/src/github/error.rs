//! GitHub client error types.

use crate::fetch::TransportError;

/// Errors from the GitHub tree listing and raw content endpoints.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Quota exhausted. `reset` describes when it refills.
    #[error("GitHub API rate limit exceeded (resets {reset}); set REPODEX_GITHUB_TOKEN or GITHUB_TOKEN to raise the limit")]
    RateLimited { reset: String },

    /// Non-2xx response from the listing endpoint.
    #[error("GitHub API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Transport kept failing until the retry budget ran out.
    #[error("network error after {attempts} attempts: {source}")]
    Network { attempts: u32, source: TransportError },

    /// The client could not be constructed.
    #[error("client error: {0}")]
    Client(String),

    /// A 2xx response whose body could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub(crate) fn rate_limited(reset_epoch: Option<u64>) -> Self {
        let reset = match reset_epoch {
            Some(epoch) => format!("at unix time {epoch}"),
            None => "at an unknown time".to_string(),
        };
        FetchError::RateLimited { reset }
    }
}

impl From<FetchError> for repodex_core::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RateLimited { .. } => repodex_core::Error::RateLimited(err.to_string()),
            FetchError::Api { status, body } => repodex_core::Error::Api { status, body },
            FetchError::Network { .. } => repodex_core::Error::Network(err.to_string()),
            FetchError::Client(msg) => repodex_core::Error::InvalidInput(msg),
            FetchError::Parse(msg) => repodex_core::Error::Api { status: 200, body: format!("unparseable response: {msg}") },
        }
    }
}
