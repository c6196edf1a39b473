//! Unified error types for repodex.
//!
//! Each variant is one kind in the ingestion/query taxonomy. Whether a kind is
//! fatal depends on where it surfaces: per-file network failures and cache
//! failures are contained by the pipeline, the rest reach the caller.

use rmcp::model::{ErrorCode, ErrorData as McpError};

use crate::cache::CacheError;
use crate::normalize::NormalizationError;

/// Unified error types for the repodex pipeline and tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote quota exhausted while listing the tree.
    #[error("RATE_LIMITED: {0}")]
    RateLimited(String),

    /// Unexpected non-2xx response from the listing endpoint.
    #[error("API_ERROR: {status} - {body}")]
    Api { status: u16, body: String },

    /// Transport failure that outlived the retry budget.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Local cache read or write failed.
    #[error("CACHE_ERROR: {0}")]
    Cache(#[from] CacheError),

    /// The search backend produced a result shape we cannot decode.
    #[error("NORMALIZATION_ERROR: {0}")]
    Normalization(#[from] NormalizationError),

    /// Invalid input parameters (e.g., empty query, unknown field).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No index has been built yet, or the last build failed.
    #[error("INDEX_UNAVAILABLE: {0}")]
    IndexUnavailable(String),
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::RateLimited(msg) => (-32010, msg.clone()),
            Error::Api { status, body } => (-32008, format!("HTTP {status}: {body}")),
            Error::Network(msg) => (-32006, msg.clone()),
            Error::Cache(e) => (-32002, e.to_string()),
            Error::Normalization(e) => (-32013, e.to_string()),
            Error::IndexUnavailable(msg) => (-32014, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
