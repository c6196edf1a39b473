//! Error types for cache operations.

use std::path::PathBuf;

/// Errors raised by [`CacheStore`](super::CacheStore).
///
/// Reads never surface these to callers: [`CacheStore::load`](super::CacheStore::load)
/// turns every failure into a miss. Writes return them so the caller can log
/// and carry on.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid cache header in {path}: {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch { path: PathBuf, expected: String, actual: String },

    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch { path: PathBuf, expected: u32, actual: u32 },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

impl CacheError {
    /// True when the underlying file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
