//! repo_search tool implementation.
//!
//! Free-text search over the indexed repository. The index is built on
//! first use if startup indexing has not finished or failed.

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use repodex_core::{Error, Field, SearchQuery, SearchResult};

use crate::state::ServerState;

const MAX_LIMIT: usize = 100;

/// Input parameters for repo_search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RepoSearchParams {
    /// Search query (required).
    pub query: String,

    /// Fields to search: "text", "filename" or "id". Defaults to all indexed text fields.
    #[serde(default)]
    pub fields: Option<Vec<String>>,

    /// Maximum number of results (1-100, default from configuration).
    #[serde(default)]
    pub limit: Option<usize>,

    /// Restrict results to files with exactly this name (e.g. "README.md").
    #[serde(default)]
    pub filename: Option<String>,

    /// Characters of text to include per result (default from configuration).
    #[serde(default)]
    pub preview_chars: Option<usize>,
}

/// Output structure for repo_search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepoSearchOutput {
    pub query: String,
    pub total: usize,
    pub results: Vec<SearchHit>,
}

/// One result, with its text cut to a preview.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
    /// Path of the file in the repository.
    pub id: String,
    pub filename: String,
    pub score: Option<f64>,
    pub preview: String,
}

impl SearchHit {
    fn from_result(result: &SearchResult, preview_chars: usize) -> Self {
        Self {
            id: result.id.clone(),
            filename: result.filename.clone(),
            score: result.score,
            preview: result.preview(preview_chars),
        }
    }
}

/// Implementation of the repo_search tool.
pub async fn search_impl(state: &ServerState, params: RepoSearchParams) -> Result<CallToolResult, McpError> {
    let query = build_query(state, &params)?;
    let index = state.ensure_index().await?;

    let results = state.pipeline().search_with(&index, &query)?;

    let preview_chars = params.preview_chars.unwrap_or(state.pipeline().config().preview_chars);
    let output = RepoSearchOutput {
        query: query.text,
        total: results.len(),
        results: results.iter().map(|r| SearchHit::from_result(r, preview_chars)).collect(),
    };

    tracing::debug!(query = %output.query, total = output.total, "repo_search");

    Ok(CallToolResult::success(vec![Content::text(serde_json::to_string_pretty(&output).unwrap_or_default())]))
}

fn build_query(state: &ServerState, params: &RepoSearchParams) -> Result<SearchQuery, Error> {
    let text = params.query.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("query cannot be empty".into()));
    }

    let limit = params.limit.unwrap_or(state.pipeline().config().search_limit);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(Error::InvalidInput(format!("limit must be between 1 and {MAX_LIMIT}")));
    }

    let fields = params
        .fields
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|name| name.parse::<Field>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut query = SearchQuery::new(text).fields(fields).limit(limit);
    if let Some(filename) = params.filename.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        query = query.filter(Field::Filename, filename);
    }
    Ok(query)
}
