//! Coercion of fetched records into canonical [`Document`]s.
//!
//! Records arrive as loosely-typed JSON maps whose keys vary by producer
//! (`content` vs `text`, `path` vs `id`, `name` vs `filename`). The sanitizer
//! maps them onto the canonical schema, stringifies every field and drops
//! anything without an id or without non-blank text.
//!
//! Within a batch the first record for an id wins; later duplicates are
//! discarded with a warning.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::document::Document;

/// A fetched record before sanitization.
pub type RawRecord = Map<String, Value>;

const ID_KEYS: [&str; 2] = ["id", "path"];
const FILENAME_KEYS: [&str; 2] = ["filename", "name"];
const TEXT_KEYS: [&str; 2] = ["text", "content"];

/// Sanitize a single record.
///
/// Returns `None` when the record has no usable id or its text is empty or
/// whitespace-only. Canonical keys take precedence over their aliases.
pub fn sanitize(raw: &RawRecord) -> Option<Document> {
    let id = first_string(raw, &ID_KEYS)?;
    if id.trim().is_empty() {
        return None;
    }

    let text = first_string(raw, &TEXT_KEYS)?;
    if text.trim().is_empty() {
        return None;
    }

    let filename = first_string(raw, &FILENAME_KEYS)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| basename(&id).to_string());

    Some(Document { id, filename, text })
}

/// Sanitize a batch, keeping the first occurrence of each id.
pub fn sanitize_batch<I>(records: I) -> Vec<Document>
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut sanitizer = Sanitizer::default();
    let docs: Vec<Document> = records.into_iter().filter_map(|raw| sanitizer.push(&raw)).collect();

    tracing::debug!(
        kept = docs.len(),
        dropped = sanitizer.dropped,
        duplicates = sanitizer.duplicates,
        "sanitized batch"
    );

    docs
}

/// Streaming sanitizer that remembers which ids it has already emitted.
#[derive(Debug, Default)]
pub struct Sanitizer {
    seen: HashSet<String>,
    dropped: usize,
    duplicates: usize,
}

impl Sanitizer {
    /// Sanitize one record, returning `None` for invalid records and for ids
    /// that were already emitted.
    pub fn push(&mut self, raw: &RawRecord) -> Option<Document> {
        let Some(doc) = sanitize(raw) else {
            self.dropped += 1;
            return None;
        };

        if !self.seen.insert(doc.id.clone()) {
            tracing::warn!(id = %doc.id, "duplicate document id, keeping first occurrence");
            self.duplicates += 1;
            return None;
        }

        Some(doc)
    }

    /// Number of records rejected as invalid so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of records rejected as duplicates so far.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

impl From<&Document> for RawRecord {
    fn from(doc: &Document) -> Self {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::String(doc.id.clone()));
        map.insert("filename".to_string(), Value::String(doc.filename.clone()));
        map.insert("text".to_string(), Value::String(doc.text.clone()));
        map
    }
}

fn first_string(raw: &RawRecord, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| raw.get(*key).and_then(coerce_string))
}

/// Force a JSON value to a string. `null` counts as absent.
fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn basename(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or(path)
}
