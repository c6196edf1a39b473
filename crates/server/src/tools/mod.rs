//! MCP tool implementations.
//!
//! This module contains all tools exposed by the repodex server.

pub mod repo_reindex;
pub mod repo_search;
