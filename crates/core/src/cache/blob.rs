//! Framed binary blobs with integrity checks.
//!
//! Layout: 4-byte little-endian header length, bincode header, bincode payload.
//! The header carries magic bytes, the blob format version and the SHA-256 of
//! the payload.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::CacheError;

const BLOB_MAGIC: [u8; 4] = *b"RPDX";

/// Bump on any breaking change to the header or payload encoding.
pub const BLOB_FORMAT_VERSION: u32 = 1;

/// Upper bound on bytes the header decoder may claim.
const MAX_HEADER_BYTES: usize = 1024;

/// Upper bound on bytes the payload decoder may claim.
pub const MAX_PAYLOAD_BYTES: usize = 1 << 30;

fn header_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_HEADER_BYTES>()
}

fn payload_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_PAYLOAD_BYTES>()
}

#[derive(Debug, Serialize, Deserialize)]
struct BlobHeader {
    magic: [u8; 4],
    format_version: u32,
    checksum: String,
}

/// Hex SHA-256 of `payload`.
pub fn checksum(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Encode `value` into a framed blob.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CacheError> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| CacheError::Serialization { reason: e.to_string() })?;

    let header = BlobHeader { magic: BLOB_MAGIC, format_version: BLOB_FORMAT_VERSION, checksum: checksum(&payload) };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization { reason: e.to_string() })?;

    let mut out = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    out.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a framed blob read from `path`, verifying header and checksum.
pub fn decode<T: DeserializeOwned>(path: &Path, raw: &[u8]) -> Result<T, CacheError> {
    let invalid = |reason: &str| CacheError::InvalidHeader { path: path.to_path_buf(), reason: reason.to_string() };

    let len_bytes: [u8; 4] = raw.get(..4).and_then(|b| b.try_into().ok()).ok_or_else(|| invalid("truncated"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_end = Some(4 + header_len).filter(|end| *end <= raw.len()).ok_or_else(|| invalid("truncated"))?;

    if header_len > MAX_HEADER_BYTES {
        return Err(invalid("header too large"));
    }

    // lengths inside a corrupt header must never size an allocation
    let (header, _): (BlobHeader, usize) =
        bincode::serde::decode_from_slice(&raw[4..header_end], header_config()).map_err(|e| invalid(&e.to_string()))?;

    if header.magic != BLOB_MAGIC {
        return Err(invalid("bad magic bytes"));
    }
    if header.format_version != BLOB_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            path: path.to_path_buf(),
            expected: BLOB_FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let payload = &raw[header_end..];
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(CacheError::Serialization { reason: format!("payload of {} bytes exceeds limit", payload.len()) });
    }
    let actual = checksum(payload);
    if actual != header.checksum {
        return Err(CacheError::ChecksumMismatch { path: path.to_path_buf(), expected: header.checksum, actual });
    }

    let (value, _): (T, usize) = bincode::serde::decode_from_slice(payload, payload_config())
        .map_err(|e| CacheError::Serialization { reason: e.to_string() })?;
    Ok(value)
}

/// Write `bytes` to `path` via a synced temporary sibling and a rename.
///
/// A crash mid-write leaves at most a stray `.tmp` file; the previous
/// contents of `path` stay intact until the rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let tmp = tmp_path(path);

    let result = write_synced(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path).map_err(io_error(path)));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes).map_err(io_error(path))?;
    let file = writer.into_inner().map_err(|e| io_error(path)(e.into_error()))?;
    file.sync_all().map_err(io_error(path))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError {
    let path = path.to_path_buf();
    move |source| CacheError::Io { path, source }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
