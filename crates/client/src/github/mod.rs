//! GitHub repository client.
//!
//! Lists a branch's files through the git trees API and downloads each
//! file from the raw content host, which does not count against the REST
//! quota.
//!
//! ### Failure handling
//!
//! - **Listing**: transport failures are retried per the [`RetryPolicy`].
//!   HTTP 429, or 403 with `x-ratelimit-remaining: 0` or a "rate limit" body,
//!   is [`FetchError::RateLimited`]. Any other non-2xx is [`FetchError::Api`].
//! - **Content**: transport failures and 429/500/502/503/504 are retried.
//!   Any other non-2xx (404, 403 on a private file, ...) yields `Ok(None)`
//!   at once: the file is unavailable, not the ingestion.

pub mod error;
pub mod response;

pub use error::FetchError;
pub use response::{TreeEntry, TreeResponse};

use std::sync::Arc;

use reqwest::StatusCode;

use crate::fetch::{
    Endpoints, HttpResponse, HttpTransport, Outcome, RetryPolicy, Sleeper, ThreadSleeper, Transport, TransportError,
    with_retry,
};
use repodex_core::AppConfig;

const ACCEPT_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Statuses worth retrying when fetching content.
const TRANSIENT_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Settings for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub api_base_url: String,
    pub raw_base_url: String,
    /// Extensions kept by [`GithubClient::list_paths`]; empty keeps all.
    pub extensions: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self::from_app(&AppConfig::default())
    }
}

impl GithubConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            token: config.github_token.clone().filter(|t| !t.trim().is_empty()),
            api_base_url: config.api_base_url.clone(),
            raw_base_url: config.raw_base_url.clone(),
            extensions: config.extensions.clone(),
            retry: RetryPolicy::new(config.max_attempts, config.retry_backoff()),
        }
    }
}

/// Blocking client for the tree listing and raw content endpoints.
#[derive(Clone)]
pub struct GithubClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    endpoints: Endpoints,
    token: Option<String>,
    extensions: Vec<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("endpoints", &self.endpoints)
            .field("authenticated", &self.token.is_some())
            .field("extensions", &self.extensions)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    /// Create a client with an explicit transport and sleeper.
    pub fn new(
        config: GithubConfig, transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, FetchError> {
        let endpoints = Endpoints::new(&config.api_base_url, &config.raw_base_url)
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            transport,
            sleeper,
            endpoints,
            token: config.token,
            extensions: config.extensions,
            retry: config.retry,
        })
    }

    /// Create a client over real HTTP from application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        let transport = HttpTransport::new(&config.user_agent, config.timeout())
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Self::new(GithubConfig::from_app(config), Arc::new(transport), Arc::new(ThreadSleeper))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// List file paths on `branch`, filtered to the configured extensions.
    pub fn list_paths(&self, owner: &str, repo: &str, branch: &str) -> Result<Vec<String>, FetchError> {
        let url = self.endpoints.tree_url(owner, repo, branch);
        let headers = self.headers(Some(ACCEPT_JSON));

        tracing::debug!(owner, repo, branch, "listing repository tree");

        let response = with_retry(&self.retry, self.sleeper.as_ref(), url.as_str(), |_| {
            match self.transport.get(&url, &headers) {
                Ok(resp) => Outcome::Done(resp),
                Err(err) => Outcome::Transient(err),
            }
        })
        .map_err(|e| FetchError::Network { attempts: e.attempts, source: e.last })?;

        if is_rate_limited(&response) {
            let reset = response.header("x-ratelimit-reset").and_then(|v| v.trim().parse().ok());
            tracing::warn!(owner, repo, authenticated = self.is_authenticated(), "GitHub rate limit exceeded");
            return Err(FetchError::rate_limited(reset));
        }

        if !response.status.is_success() {
            return Err(FetchError::Api { status: response.status.as_u16(), body: response.body });
        }

        let tree: TreeResponse = serde_json::from_str(&response.body).map_err(|e| FetchError::Parse(e.to_string()))?;
        if tree.truncated {
            tracing::warn!(owner, repo, branch, entries = tree.tree.len(), "tree listing was truncated by GitHub");
        }

        let paths = tree.blob_paths(&self.extensions);
        tracing::info!(owner, repo, branch, listed = tree.tree.len(), kept = paths.len(), "listed repository files");
        Ok(paths)
    }

    /// Fetch a file's text, or `None` when the host answers with a permanent non-2xx.
    ///
    /// # Errors
    ///
    /// [`FetchError::Network`] once the retry budget is spent on transport
    /// failures or transient statuses.
    pub fn get_content(&self, owner: &str, repo: &str, path: &str, branch: &str) -> Result<Option<String>, FetchError> {
        let url = self.endpoints.raw_url(owner, repo, branch, path);
        let headers = self.headers(None);

        let response = with_retry(&self.retry, self.sleeper.as_ref(), url.as_str(), |_| {
            match self.transport.get(&url, &headers) {
                Ok(resp) if TRANSIENT_STATUSES.contains(&resp.status) => {
                    Outcome::Transient(TransportError::Status(resp.status.as_u16()))
                }
                Ok(resp) => Outcome::Done(resp),
                Err(err) => Outcome::Transient(err),
            }
        })
        .map_err(|e| FetchError::Network { attempts: e.attempts, source: e.last })?;

        if response.status.is_success() {
            Ok(Some(response.body))
        } else {
            tracing::debug!(path, status = response.status.as_u16(), "file unavailable, skipping");
            Ok(None)
        }
    }

    fn headers(&self, accept: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(3);
        if let Some(accept) = accept {
            headers.push(("Accept", accept.to_string()));
            headers.push(("X-GitHub-Api-Version", API_VERSION.to_string()));
        }
        if let Some(token) = &self.token {
            headers.push(("Authorization", format!("Bearer {token}")));
        }
        headers
    }
}

fn is_rate_limited(response: &HttpResponse) -> bool {
    match response.status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => {
            response.header("x-ratelimit-remaining").map(str::trim) == Some("0")
                || response.body.to_lowercase().contains("rate limit")
        }
        _ => false,
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::time::Duration;

    fn setup(max_attempts: u32) -> (Arc<FakeTransport>, Arc<RecordingSleeper>, GithubClient) {
        let transport = Arc::new(FakeTransport::default());
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(config(max_attempts, &[100, 200, 400]), &transport, &sleeper);
        (transport, sleeper, client)
    }

    #[test]
    fn test_list_paths_filters_and_preserves_order() {
        let (transport, _, client) = setup(3);
        transport.ok(TREE_URL, 200, &tree_body(&["b.md", "a.txt", "dir/c.MD", "tool.py", "ci.yaml", "Cargo.lock"]));
        assert_eq!(
            client.list_paths("acme", "notes", "master").unwrap(),
            vec!["b.md", "dir/c.MD", "tool.py", "ci.yaml"]
        );
    }

    #[test]
    fn test_list_paths_detects_rate_limit() {
        let (transport, _, client) = setup(3);
        transport.route(
            TREE_URL,
            vec![Ok(HttpResponse::new(403, "{}")
                .with_header("x-ratelimit-remaining", "0")
                .with_header("x-ratelimit-reset", "1700000000"))],
        );
        let err = client.list_paths("acme", "notes", "master").unwrap_err();
        assert!(matches!(&err, FetchError::RateLimited { reset } if reset.contains("1700000000")));

        transport.ok(TREE_URL, 403, r#"{"message":"API rate limit exceeded for 1.2.3.4"}"#);
        assert!(matches!(client.list_paths("acme", "notes", "master"), Err(FetchError::RateLimited { .. })));

        transport.ok(TREE_URL, 429, "");
        assert!(matches!(client.list_paths("acme", "notes", "master"), Err(FetchError::RateLimited { .. })));
    }

    #[test]
    fn test_list_paths_api_error() {
        let (transport, sleeper, client) = setup(3);
        transport.ok(TREE_URL, 404, r#"{"message":"Not Found"}"#);
        let err = client.list_paths("acme", "notes", "master").unwrap_err();
        assert!(matches!(err, FetchError::Api { status: 404, ref body } if body.contains("Not Found")));

        // 5xx on listing is reported, not retried
        transport.ok(TREE_URL, 502, "bad gateway");
        assert!(matches!(client.list_paths("acme", "notes", "master"), Err(FetchError::Api { status: 502, .. })));
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_list_paths_retries_transport_failures() {
        let (transport, sleeper, client) = setup(3);
        transport.route(
            TREE_URL,
            vec![Err(TransportError::Connect("refused".into())), Ok(HttpResponse::new(200, tree_body(&["a.md"])))],
        );
        assert_eq!(client.list_paths("acme", "notes", "master").unwrap(), vec!["a.md"]);
        assert_eq!(transport.requests_to(TREE_URL), 2);
        assert_eq!(*sleeper.0.lock().unwrap(), vec![Duration::from_millis(100)]);
    }

    #[test]
    fn test_list_paths_rejects_malformed_body() {
        let (transport, _, client) = setup(3);
        transport.ok(TREE_URL, 200, "<html>");
        assert!(matches!(client.list_paths("acme", "notes", "master"), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_get_content_succeeds_after_k_failures() {
        for k in 0..3u32 {
            let (transport, sleeper, client) = setup(3);
            let url = raw_url("a.md");
            let mut script: Vec<Result<HttpResponse, TransportError>> =
                (0..k).map(|_| Err(TransportError::Timeout)).collect();
            script.push(Ok(HttpResponse::new(200, "# A")));
            transport.route(&url, script);

            assert_eq!(client.get_content("acme", "notes", "a.md", "master").unwrap().as_deref(), Some("# A"));
            assert_eq!(transport.requests_to(&url), (k + 1) as usize);
            let expected: Vec<Duration> =
                [100, 200, 400].iter().take(k as usize).map(|ms| Duration::from_millis(*ms)).collect();
            assert_eq!(*sleeper.0.lock().unwrap(), expected);
        }
    }

    #[test]
    fn test_get_content_exhausts_budget() {
        let (transport, sleeper, client) = setup(3);
        let url = raw_url("a.md");
        transport.route(
            &url,
            vec![
                Err(TransportError::Timeout),
                Err(TransportError::Connect("reset".into())),
                Err(TransportError::Body("eof".into())),
            ],
        );
        let err = client.get_content("acme", "notes", "a.md", "master").unwrap_err();
        assert!(matches!(err, FetchError::Network { attempts: 3, source: TransportError::Body(_) }));
        assert_eq!(transport.requests_to(&url), 3);
        assert_eq!(sleeper.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_get_content_retries_transient_statuses() {
        let (transport, _, client) = setup(3);
        let url = raw_url("a.md");
        transport.route(&url, vec![Ok(HttpResponse::new(503, "")), Ok(HttpResponse::new(200, "ok"))]);
        assert_eq!(client.get_content("acme", "notes", "a.md", "master").unwrap().as_deref(), Some("ok"));

        transport.ok(&url, 500, "");
        let err = client.get_content("acme", "notes", "a.md", "master").unwrap_err();
        assert!(matches!(err, FetchError::Network { source: TransportError::Status(500), .. }));
    }

    #[test]
    fn test_get_content_404_is_none_without_retry() {
        let (transport, sleeper, client) = setup(3);
        let url = raw_url("missing.md");
        transport.ok(&url, 404, "404: Not Found");
        assert_eq!(client.get_content("acme", "notes", "missing.md", "master").unwrap(), None);
        assert_eq!(transport.requests_to(&url), 1);
        assert!(sleeper.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_token_is_sent_as_bearer() {
        let transport = Arc::new(FakeTransport::default());
        let sleeper = Arc::new(RecordingSleeper::default());
        let client = client(GithubConfig { token: Some("s3cret".into()), ..config(1, &[]) }, &transport, &sleeper);
        assert!(client.is_authenticated());

        transport.ok(TREE_URL, 200, &tree_body(&[]));
        client.list_paths("acme", "notes", "master").unwrap();
        let headers = transport.last_headers();
        assert!(headers.contains(&("Authorization", "Bearer s3cret".to_string())));
        assert!(headers.contains(&("Accept", ACCEPT_JSON.to_string())));
    }

    #[test]
    fn test_no_token_sends_no_authorization() {
        let (transport, _, client) = setup(1);
        client.get_content("acme", "notes", "a.md", "master").unwrap();
        assert!(transport.last_headers().iter().all(|(name, _)| *name != "Authorization"));
        assert!(!format!("{client:?}").contains("token"));
    }
}
