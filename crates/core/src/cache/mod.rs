//! File-backed cache for one repository's document set.
//!
//! Each [`CacheStore`] owns a single directory (typically
//! `{cache_dir}/{owner}/{repo}/{branch}`) holding:
//!
//! - `documents.bin`: framed [`CacheEntry`] blob, the source of truth
//! - `documents.json`: pretty-printed copy of the documents for inspection
//! - `index.bin`: optional prebuilt [`Index`]
//!
//! Loading is fail-safe: a missing, truncated, tampered, stale or
//! version-mismatched file is a cache miss, never an error.

pub mod blob;
pub mod error;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::index::Index;

pub use error::CacheError;

/// Version of the [`CacheEntry`] layout.
pub const ENTRY_FORMAT_VERSION: u32 = 1;

const DOCUMENTS_BIN: &str = "documents.bin";
const DOCUMENTS_JSON: &str = "documents.json";
const INDEX_BIN: &str = "index.bin";

/// Persisted document set with its creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub documents: Vec<Document>,
}

impl CacheEntry {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { format_version: ENTRY_FORMAT_VERSION, created_at: Utc::now(), documents }
    }

    /// Whether the entry is older than `max_age` at `now`.
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.created_at) > max_age
    }
}

/// Cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    max_age: Option<Duration>,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), max_age: None }
    }

    /// Treat entries older than `max_age` as misses. `None` disables expiry.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn documents_path(&self) -> PathBuf {
        self.dir.join(DOCUMENTS_BIN)
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(DOCUMENTS_JSON)
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_BIN)
    }

    /// Load the cached documents, or `None` on any miss.
    pub fn load(&self) -> Option<Vec<Document>> {
        let entry = match self.load_entry() {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => {
                tracing::debug!(dir = %self.dir.display(), "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "ignoring unreadable cache");
                return None;
            }
        };

        if let Some(max_age) = self.max_age
            && entry.is_stale(max_age, Utc::now())
        {
            tracing::info!(dir = %self.dir.display(), created_at = %entry.created_at, "cache entry is stale");
            return None;
        }

        tracing::debug!(dir = %self.dir.display(), documents = entry.documents.len(), "cache hit");
        Some(entry.documents)
    }

    /// Load and verify the raw entry without applying the staleness check.
    pub fn load_entry(&self) -> Result<CacheEntry, CacheError> {
        let path = self.documents_path();
        let raw = read(&path)?;
        let entry: CacheEntry = blob::decode(&path, &raw)?;

        if entry.format_version != ENTRY_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: ENTRY_FORMAT_VERSION,
                actual: entry.format_version,
            });
        }
        Ok(entry)
    }

    /// Persist `documents`, replacing any previous entry.
    ///
    /// Writes the binary entry first, then the JSON copy. A prebuilt index
    /// from an earlier save is removed since it no longer matches.
    pub fn save(&self, documents: &[Document]) -> Result<(), CacheError> {
        self.ensure_dir()?;

        let entry = CacheEntry::new(documents.to_vec());
        blob::write_atomic(&self.documents_path(), &blob::encode(&entry)?)?;

        let json = serde_json::to_vec_pretty(&entry.documents)
            .map_err(|e| CacheError::Serialization { reason: e.to_string() })?;
        blob::write_atomic(&self.json_path(), &json)?;

        remove_if_exists(&self.index_path())?;

        tracing::debug!(dir = %self.dir.display(), documents = documents.len(), "saved cache");
        Ok(())
    }

    /// Persist a prebuilt index next to the documents.
    pub fn save_index(&self, index: &Index) -> Result<(), CacheError> {
        self.ensure_dir()?;
        blob::write_atomic(&self.index_path(), &blob::encode(index)?)
    }

    /// Load the prebuilt index, or `None` on any miss.
    pub fn load_index(&self) -> Option<Index> {
        let path = self.index_path();
        let result = read(&path).and_then(|raw| blob::decode::<Index>(&path, &raw));
        match result {
            Ok(index) => Some(index),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable index");
                None
            }
        }
    }

    /// Remove every cache file. Missing files are not an error.
    pub fn clear(&self) -> Result<(), CacheError> {
        for path in [self.documents_path(), self.json_path(), self.index_path()] {
            remove_if_exists(&path)?;
        }
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io { path: self.dir.clone(), source })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CacheError> {
    std::fs::read(path).map_err(|source| CacheError::Io { path: path.to_path_buf(), source })
}

fn remove_if_exists(path: &Path) -> Result<(), CacheError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(CacheError::Io { path: path.to_path_buf(), source }),
    }
}
