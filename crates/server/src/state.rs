//! Shared server state: the pipeline and the currently served index.
//!
//! The index is swapped only after a successful rebuild, so a failed
//! refresh keeps answering queries from the previous index.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use repodex_client::Pipeline;
use repodex_core::{AppConfig, Error, Index};

/// The repository the server indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RepoTarget {
    /// Resolve the target from configured defaults, if both owner and repo are set.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let (owner, repo) = config.require_repo(None, None).ok()?;
        Some(Self { owner, repo, branch: config.branch.clone() })
    }
}

impl std::fmt::Display for RepoTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.branch)
    }
}

pub struct ServerState {
    pipeline: Arc<Pipeline>,
    target: Option<RepoTarget>,
    index: RwLock<Option<Arc<Index>>>,
    rebuild: Mutex<()>,
}

impl ServerState {
    pub fn new(pipeline: Pipeline, target: Option<RepoTarget>) -> Self {
        Self { pipeline: Arc::new(pipeline), target, index: RwLock::new(None), rebuild: Mutex::new(()) }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self::new(Pipeline::from_config(config)?, RepoTarget::from_config(config)))
    }

    /// Build state from configuration on the blocking pool.
    ///
    /// The blocking HTTP client must not be constructed on an async worker thread.
    pub async fn load(config: AppConfig) -> Result<Self, Error> {
        tokio::task::spawn_blocking(move || Self::from_config(&config))
            .await
            .map_err(|e| Error::IndexUnavailable(format!("server state task failed: {e}")))?
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn target(&self) -> Result<&RepoTarget, Error> {
        self.target.as_ref().ok_or_else(|| {
            Error::IndexUnavailable("no repository configured; set REPODEX_OWNER and REPODEX_REPO".into())
        })
    }

    pub async fn current_index(&self) -> Option<Arc<Index>> {
        self.index.read().await.clone()
    }

    /// Return the served index, building it from cache or remote on first use.
    pub async fn ensure_index(&self) -> Result<Arc<Index>, Error> {
        if let Some(index) = self.current_index().await {
            return Ok(index);
        }
        self.rebuild(false).await
    }

    /// Rebuild the index on the blocking pool and swap it in on success.
    ///
    /// Concurrent callers are serialized. On failure the previous index, if
    /// any, stays in place.
    pub async fn rebuild(&self, force_refresh: bool) -> Result<Arc<Index>, Error> {
        let target = self.target()?.clone();
        let _guard = self.rebuild.lock().await;

        // another caller may have finished a build while we waited
        if !force_refresh && let Some(index) = self.current_index().await {
            return Ok(index);
        }

        let pipeline = Arc::clone(&self.pipeline);
        let RepoTarget { owner, repo, branch } = target.clone();
        let built = tokio::task::spawn_blocking(move || pipeline.index_data(&owner, &repo, force_refresh, &branch))
            .await
            .map_err(|e| Error::IndexUnavailable(format!("index build task failed: {e}")))?;

        match built {
            Ok(index) => {
                let index = Arc::new(index);
                *self.index.write().await = Some(Arc::clone(&index));
                tracing::info!(target_repo = %target, documents = index.len(), force_refresh, "index ready");
                Ok(index)
            }
            Err(e) => {
                tracing::warn!(target_repo = %target, error = %e, force_refresh, "index build failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process fake GitHub for tool tests.

    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use repodex_client::{
        GithubClient, GithubConfig, HttpResponse, RetryPolicy, Sleeper, Transport, TransportError, Url,
    };

    use super::*;

    #[derive(Default)]
    pub struct FakeGithub {
        routes: StdMutex<HashMap<String, HttpResponse>>,
    }

    impl FakeGithub {
        pub fn serve(&self, files: &[(&str, &str)]) {
            let entries: Vec<serde_json::Value> =
                files.iter().map(|(p, _)| serde_json::json!({"path": p, "type": "blob"})).collect();
            let tree = serde_json::json!({"tree": entries, "truncated": false}).to_string();

            let mut routes = self.routes.lock().unwrap();
            routes.clear();
            routes.insert(
                "https://api.github.com/repos/acme/notes/git/trees/master?recursive=1".into(),
                HttpResponse::new(200, tree),
            );
            for (path, body) in files {
                routes.insert(
                    format!("https://raw.githubusercontent.com/acme/notes/master/{path}"),
                    HttpResponse::new(200, *body),
                );
            }
        }

        pub fn fail_listing(&self, status: u16) {
            self.routes.lock().unwrap().insert(
                "https://api.github.com/repos/acme/notes/git/trees/master?recursive=1".into(),
                HttpResponse::new(status, "unavailable"),
            );
        }
    }

    impl Transport for FakeGithub {
        fn get(&self, url: &Url, _headers: &[(&'static str, String)]) -> Result<HttpResponse, TransportError> {
            let routes = self.routes.lock().unwrap();
            Ok(routes.get(url.as_str()).cloned().unwrap_or_else(|| HttpResponse::new(404, "")))
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _duration: Duration) {}
    }

    pub fn state(dir: &std::path::Path, github: &Arc<FakeGithub>, target: bool) -> ServerState {
        let config = AppConfig {
            cache_dir: dir.to_path_buf(),
            owner: Some("acme".into()),
            repo: Some("notes".into()),
            ..Default::default()
        };
        let client = GithubClient::new(
            GithubConfig { retry: RetryPolicy::new(1, Vec::new()), ..GithubConfig::from_app(&config) },
            github.clone(),
            Arc::new(NoSleep),
        )
        .unwrap();
        let target = if target { RepoTarget::from_config(&config) } else { None };
        ServerState::new(Pipeline::new(client, &config), target)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_ensure_index_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        github.serve(&[("a.md", "alpha")]);
        let state = state(dir.path(), &github, true);

        assert!(state.current_index().await.is_none());
        let first = state.ensure_index().await.unwrap();
        let second = state.ensure_index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        github.serve(&[("a.md", "alpha")]);
        let state = state(dir.path(), &github, true);
        let before = state.ensure_index().await.unwrap();

        github.fail_listing(500);
        assert!(matches!(state.rebuild(true).await, Err(Error::Api { status: 500, .. })));

        let after = state.current_index().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_missing_target_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let github = Arc::new(FakeGithub::default());
        let state = state(dir.path(), &github, false);
        assert!(matches!(state.ensure_index().await, Err(Error::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn test_load_builds_http_client_inside_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            cache_dir: dir.path().to_path_buf(),
            owner: Some("acme".into()),
            repo: Some("notes".into()),
            ..Default::default()
        };

        let state = ServerState::load(config).await.unwrap();
        assert_eq!(state.target().unwrap().to_string(), "acme/notes@master");
        assert!(state.current_index().await.is_none());
    }

    #[test]
    fn test_target_display() {
        let target = RepoTarget { owner: "acme".into(), repo: "notes".into(), branch: "master".into() };
        assert_eq!(target.to_string(), "acme/notes@master");
    }
}
