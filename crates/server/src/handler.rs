//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::ServerState;
use crate::tools::repo_reindex::{RepoReindexParams, reindex_impl};
use crate::tools::repo_search::{RepoSearchParams, search_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for repodex.
#[derive(Clone)]
pub struct RepodexServer {
    state: Arc<ServerState>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl RepodexServer {
    /// Create a new server handler over shared state.
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    /// Search the indexed repository.
    #[tool(
        description = "Search the indexed GitHub repository's files. Returns matching file paths, relevance scores and a text preview of each file."
    )]
    async fn repo_search(&self, params: Parameters<RepoSearchParams>) -> Result<CallToolResult, McpError> {
        search_impl(&self.state, params.0).await
    }

    /// Rebuild the repository index.
    #[tool(
        description = "Rebuild the repository index. By default refetches every file from GitHub; pass force_refresh=false to reload from the local cache. On failure the previous index keeps serving searches."
    )]
    async fn repo_reindex(&self, params: Parameters<RepoReindexParams>) -> Result<CallToolResult, McpError> {
        reindex_impl(&self.state, params.0).await
    }
}

impl ServerHandler for RepodexServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "repodex".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Use repo_search to find files in the configured repository; use repo_reindex after it changes."
                    .into(),
            ),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::*;

    #[test]
    fn test_router_lists_both_tools() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        let server = RepodexServer::new(Arc::new(state(dir.path(), &github, true)));

        let names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        assert!(names.contains(&"repo_search".to_string()));
        assert!(names.contains(&"repo_reindex".to_string()));
        assert_eq!(server.get_info().server_info.name, "repodex");
    }
}
