//! Ingestion pipeline: fetch, sanitize, cache, index, search.
//!
//! [`Pipeline::index_data`] is the single entry point for building an
//! index. It prefers the local cache and only talks to GitHub when the cache
//! misses or a refresh is forced. A refresh that fails (listing error, or
//! every file fetch failing) returns the error and leaves the cache exactly
//! as it was.

use serde_json::Value;

use repodex_core::normalize::normalize;
use repodex_core::{
    AppConfig, CacheStore, Document, Error, Field, Index, IndexBuilder, RawRecord, SearchQuery, SearchResult,
    sanitize_batch,
};

use crate::github::GithubClient;

/// Fetches a repository into a searchable [`Index`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    github: GithubClient,
    builder: IndexBuilder,
    config: AppConfig,
}

impl Pipeline {
    /// Create a pipeline over an existing client, taking cache settings from `config`.
    pub fn new(github: GithubClient, config: &AppConfig) -> Self {
        Self { github, builder: IndexBuilder::new(), config: config.clone() }
    }

    /// Create a pipeline talking to GitHub over HTTP.
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self::new(GithubClient::from_config(config)?, config))
    }

    /// Use a custom field configuration for built indexes.
    pub fn with_index_builder(mut self, builder: IndexBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cache for one repository branch.
    pub fn cache_store(&self, owner: &str, repo: &str, branch: &str) -> CacheStore {
        CacheStore::new(self.config.repo_cache_dir(owner, repo, branch)).with_max_age(self.config.cache_ttl())
    }

    /// Build (or load) the index for `owner/repo` at `branch`.
    ///
    /// Unless `force_refresh` is set, a valid cache short-circuits all network
    /// access. Cache write failures are logged and do not fail the call.
    ///
    /// # Errors
    ///
    /// Listing failures ([`Error::RateLimited`], [`Error::Api`],
    /// [`Error::Network`]) and a refresh where every file fetch failed.
    pub fn index_data(&self, owner: &str, repo: &str, force_refresh: bool, branch: &str) -> Result<Index, Error> {
        let store = self.cache_store(owner, repo, branch);

        if force_refresh {
            tracing::info!(owner, repo, branch, "force refresh requested, bypassing cache");
        } else if let Some(documents) = store.load() {
            return Ok(self.index_from_cache(&store, documents));
        }

        let documents = self.fetch_documents(owner, repo, branch)?;
        let index = self.builder.clone().build(documents);

        match store.save(index.documents()) {
            Ok(()) => {
                if let Err(e) = store.save_index(&index) {
                    tracing::warn!(dir = %store.dir().display(), error = %e, "failed to cache index");
                }
            }
            Err(e) => tracing::warn!(dir = %store.dir().display(), error = %e, "failed to cache documents"),
        }

        tracing::info!(owner, repo, branch, documents = index.len(), "index built from remote");
        Ok(index)
    }

    /// List and download every matching file, then sanitize the batch.
    ///
    /// Files that 404 (or otherwise permanently fail) are skipped. Files whose
    /// retries are exhausted are skipped with a warning. When network failures
    /// leave no document at all, the whole fetch fails.
    pub fn fetch_documents(&self, owner: &str, repo: &str, branch: &str) -> Result<Vec<Document>, Error> {
        let paths = self.github.list_paths(owner, repo, branch)?;

        let mut records = Vec::with_capacity(paths.len());
        let mut unavailable = 0usize;
        let mut failed = 0usize;

        for path in &paths {
            match self.github.get_content(owner, repo, path, branch) {
                Ok(Some(content)) => records.push(record(path, content)),
                Ok(None) => unavailable += 1,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping file after repeated failures");
                    failed += 1;
                }
            }
        }

        let documents = sanitize_batch(records);
        if failed > 0 && documents.is_empty() {
            return Err(Error::Network(format!(
                "no documents fetched for {owner}/{repo}@{branch}: {failed} of {} files failed",
                paths.len()
            )));
        }

        tracing::info!(
            owner,
            repo,
            branch,
            listed = paths.len(),
            unavailable,
            failed,
            documents = documents.len(),
            "fetched repository files"
        );
        Ok(documents)
    }

    /// Free-text search over `fields` (empty = all indexed text fields).
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a blank query, [`Error::Normalization`] if
    /// the index output cannot be decoded.
    pub fn search(&self, index: &Index, query: &str, fields: &[Field], limit: usize) -> Result<Vec<SearchResult>, Error> {
        self.search_with(index, &SearchQuery::new(query).fields(fields.iter().copied()).limit(limit))
    }

    /// Run a fully specified query, including filters and boosts.
    pub fn search_with(&self, index: &Index, query: &SearchQuery) -> Result<Vec<SearchResult>, Error> {
        if query.text.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".into()));
        }

        let hits = index.search(query);
        let results = normalize(&hits, index.documents())?;
        tracing::debug!(query = %query.text, limit = query.limit, results = results.len(), "search completed");
        Ok(results)
    }

    fn index_from_cache(&self, store: &CacheStore, documents: Vec<Document>) -> Index {
        if let Some(index) = store.load_index()
            && index.covers(&documents)
            && self.builder.is_compatible(&index)
        {
            tracing::info!(dir = %store.dir().display(), documents = index.len(), "loaded prebuilt index from cache");
            return index;
        }

        let index = self.builder.clone().build(documents);
        if let Err(e) = store.save_index(&index) {
            tracing::warn!(dir = %store.dir().display(), error = %e, "failed to cache index");
        }
        tracing::info!(dir = %store.dir().display(), documents = index.len(), "index built from cached documents");
        index
    }
}

fn record(path: &str, content: String) -> RawRecord {
    let name = path.rsplit('/').next().unwrap_or(path);
    let mut raw = RawRecord::new();
    raw.insert("path".into(), Value::String(path.to_string()));
    raw.insert("name".into(), Value::String(name.to_string()));
    raw.insert("content".into(), Value::String(content));
    raw
}
