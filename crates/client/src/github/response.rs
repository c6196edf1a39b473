//! Git trees API response types.

use serde::Deserialize;

/// Response from `GET /repos/{owner}/{repo}/git/trees/{sha}?recursive=1`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeResponse {
    #[serde(default)]
    pub tree: Vec<TreeEntry>,
    /// Set when GitHub cut the listing short (very large trees).
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl TreeEntry {
    pub fn is_blob(&self) -> bool {
        self.kind == "blob"
    }
}

impl TreeResponse {
    /// Blob paths ending in one of `extensions` (case-insensitive), in listing order.
    ///
    /// An empty extension list keeps every blob.
    pub fn blob_paths(&self, extensions: &[String]) -> Vec<String> {
        let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();
        self.tree
            .iter()
            .filter(|entry| entry.is_blob())
            .filter(|entry| {
                let path = entry.path.to_lowercase();
                extensions.is_empty() || extensions.iter().any(|ext| path.ends_with(ext.as_str()))
            })
            .map(|entry| entry.path.clone())
            .collect()
    }
}
