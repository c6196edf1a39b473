//! repo_reindex tool implementation.

use std::time::Instant;

use rmcp::{ErrorData as McpError, model::*};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::ServerState;

/// Input parameters for repo_reindex tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepoReindexParams {
    /// Refetch from GitHub even if a valid cache exists (default true).
    #[serde(default = "default_true")]
    pub force_refresh: bool,
}

impl Default for RepoReindexParams {
    fn default() -> Self {
        Self { force_refresh: true }
    }
}

fn default_true() -> bool {
    true
}

/// Output structure for repo_reindex tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepoReindexOutput {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub documents: usize,
    pub force_refresh: bool,
    pub elapsed_ms: u64,
}

/// Implementation of the repo_reindex tool.
///
/// On failure the previously served index stays active and the error is
/// returned to the caller.
pub async fn reindex_impl(state: &ServerState, params: RepoReindexParams) -> Result<CallToolResult, McpError> {
    let start = Instant::now();
    let target = state.target()?.clone();
    let index = state.rebuild(params.force_refresh).await?;

    let output = RepoReindexOutput {
        owner: target.owner,
        repo: target.repo,
        branch: target.branch,
        documents: index.len(),
        force_refresh: params.force_refresh,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    Ok(CallToolResult::success(vec![Content::text(serde_json::to_string_pretty(&output).unwrap_or_default())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::*;
    use std::sync::Arc;

    fn output(result: CallToolResult) -> RepoReindexOutput {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        let text = content_val.get("text").and_then(|v| v.as_str()).expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }

    #[test]
    fn test_params_default_to_force_refresh() {
        let params: RepoReindexParams = serde_json::from_str("{}").unwrap();
        assert!(params.force_refresh);
    }

    #[tokio::test]
    async fn test_reindex_picks_up_remote_changes() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        github.serve(&[("a.md", "alpha")]);
        let state = state(dir.path(), &github, true);
        state.ensure_index().await.unwrap();

        github.serve(&[("a.md", "alpha"), ("b.md", "beta")]);
        let out = output(reindex_impl(&state, RepoReindexParams::default()).await.unwrap());
        assert_eq!(out.documents, 2);
        assert_eq!(out.owner, "acme");
        assert_eq!(state.current_index().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reindex_without_force_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        github.serve(&[("a.md", "alpha")]);
        let state = state(dir.path(), &github, true);
        reindex_impl(&state, RepoReindexParams::default()).await.unwrap();

        // fresh state over the same cache directory
        let state = crate::state::testing::state(dir.path(), &github, true);
        github.serve(&[("a.md", "alpha"), ("b.md", "beta")]);
        let out = output(reindex_impl(&state, RepoReindexParams { force_refresh: false }).await.unwrap());
        assert_eq!(out.documents, 1);
    }

    #[tokio::test]
    async fn test_failed_reindex_keeps_serving() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        github.serve(&[("a.md", "alpha")]);
        let state = state(dir.path(), &github, true);
        state.ensure_index().await.unwrap();

        github.fail_listing(429);
        let err = reindex_impl(&state, RepoReindexParams::default()).await.unwrap_err();
        assert_eq!(err.code.0, -32010);
        assert_eq!(state.current_index().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reindex_without_target() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        let state = state(dir.path(), &github, false);
        let err = reindex_impl(&state, RepoReindexParams::default()).await.unwrap_err();
        assert_eq!(err.code.0, -32014);
    }
}
