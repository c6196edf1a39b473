//! Endpoint construction for the tree listing and raw content hosts.

use ::url::Url;

/// Error type for endpoint construction failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("invalid base URL {url}: {reason}")]
    InvalidBase { url: String, reason: String },

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Parsed API and raw-content base URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    api_base: Url,
    raw_base: Url,
}

impl Endpoints {
    pub fn new(api_base: &str, raw_base: &str) -> Result<Self, UrlError> {
        Ok(Self { api_base: parse_base(api_base)?, raw_base: parse_base(raw_base)? })
    }

    /// `{api}/repos/{owner}/{repo}/git/trees/{branch}?recursive=1`
    pub fn tree_url(&self, owner: &str, repo: &str, branch: &str) -> Url {
        let mut url = self.api_base.clone();
        extend(&mut url, ["repos", owner, repo, "git", "trees"].into_iter().chain(branch.split('/')));
        url.query_pairs_mut().append_pair("recursive", "1");
        url
    }

    /// `{raw}/{owner}/{repo}/{branch}/{path}`, each segment percent-encoded.
    pub fn raw_url(&self, owner: &str, repo: &str, branch: &str, path: &str) -> Url {
        let mut url = self.raw_base.clone();
        extend(
            &mut url,
            [owner, repo].into_iter().chain(branch.split('/')).chain(path.split('/').filter(|s| !s.is_empty())),
        );
        url
    }
}

fn parse_base(input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();
    let url =
        Url::parse(trimmed).map_err(|e| UrlError::InvalidBase { url: trimmed.to_string(), reason: e.to_string() })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
    if url.cannot_be_a_base() {
        return Err(UrlError::InvalidBase { url: trimmed.to_string(), reason: "cannot be a base".into() });
    }
    Ok(url)
}

fn extend<'a>(url: &mut Url, segments: impl IntoIterator<Item = &'a str>) {
    // parse_base rejects cannot-be-a-base URLs, so this always succeeds
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
}
