//! Normalization of raw search output into [`SearchResult`]s.
//!
//! Search backends have been observed to answer in three shapes: bare
//! positions into the document sequence, `(position, score)` pairs, or full
//! records. [`RawHit`] models the three as one tagged union and
//! [`RawHit::try_from`] is the only place that tells them apart, so callers
//! never inspect JSON shapes themselves.

use serde_json::{Map, Value};

use crate::document::{Document, SearchResult};

/// Errors raised while decoding search output.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizationError {
    #[error("unrecognized result element at position {position}: {element_type}")]
    UnrecognizedShape { position: usize, element_type: &'static str },

    #[error("search output is not a sequence: {found}")]
    NotASequence { found: &'static str },

    #[error("invalid record field '{key}': {reason}")]
    InvalidRecord { key: String, reason: String },
}

/// One element of raw search output.
#[derive(Debug, Clone, PartialEq)]
pub enum RawHit {
    /// Position into the document sequence.
    Position(i64),
    /// Position with a relevance score.
    Scored(i64, f64),
    /// An already-materialized record.
    Record(Map<String, Value>),
}

impl RawHit {
    /// Classify a single element. `position` is only used for error reporting.
    pub fn classify_at(value: &Value, position: usize) -> Result<Self, NormalizationError> {
        match value {
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Ok(RawHit::Position(i)),
                (None, Some(_)) => Ok(RawHit::Position(i64::MAX)),
                _ => Err(NormalizationError::UnrecognizedShape { position, element_type: "float" }),
            },
            Value::Array(pair) => match pair.as_slice() {
                [Value::Number(idx), Value::Number(score)] if idx.is_i64() || idx.is_u64() => {
                    let idx = idx.as_i64().unwrap_or(i64::MAX);
                    let score = score.as_f64().unwrap_or(0.0);
                    Ok(RawHit::Scored(idx, score))
                }
                _ => Err(NormalizationError::UnrecognizedShape { position, element_type: "array" }),
            },
            Value::Object(map) => Ok(RawHit::Record(map.clone())),
            other => Err(NormalizationError::UnrecognizedShape { position, element_type: json_type(other) }),
        }
    }
}

impl TryFrom<&Value> for RawHit {
    type Error = NormalizationError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::classify_at(value, 0)
    }
}

/// Classify a complete search response, which must be a JSON array.
pub fn classify(raw: &Value) -> Result<Vec<RawHit>, NormalizationError> {
    let Value::Array(items) = raw else {
        return Err(NormalizationError::NotASequence { found: json_type(raw) });
    };
    items.iter().enumerate().map(|(pos, item)| RawHit::classify_at(item, pos)).collect()
}

/// Convert raw hits into search results.
///
/// Positions outside `documents` are skipped. Records are re-validated:
/// `id`, `filename` and `text` must be strings and `score`, when present,
/// must be a number.
pub fn normalize(hits: &[RawHit], documents: &[Document]) -> Result<Vec<SearchResult>, NormalizationError> {
    let mut results = Vec::with_capacity(hits.len());

    for hit in hits {
        let result = match hit {
            RawHit::Position(pos) => lookup(*pos, documents).map(|doc| SearchResult::from_document(doc, None)),
            RawHit::Scored(pos, score) => {
                lookup(*pos, documents).map(|doc| SearchResult::from_document(doc, Some(*score)))
            }
            RawHit::Record(map) => Some(validate_record(map)?),
        };
        if let Some(result) = result {
            results.push(result);
        }
    }

    Ok(results)
}

/// Classify then normalize a JSON search response.
pub fn normalize_value(raw: &Value, documents: &[Document]) -> Result<Vec<SearchResult>, NormalizationError> {
    normalize(&classify(raw)?, documents)
}

fn lookup(pos: i64, documents: &[Document]) -> Option<&Document> {
    let doc = usize::try_from(pos).ok().and_then(|idx| documents.get(idx));
    if doc.is_none() {
        tracing::debug!(position = pos, documents = documents.len(), "skipping out-of-range hit");
    }
    doc
}

fn validate_record(map: &Map<String, Value>) -> Result<SearchResult, NormalizationError> {
    let id = required_string(map, "id")?;
    let filename = required_string(map, "filename")?;
    let text = required_string(map, "text")?;

    let score = match map.get("score") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            return Err(NormalizationError::InvalidRecord {
                key: "score".to_string(),
                reason: format!("expected number, found {}", json_type(other)),
            });
        }
    };

    Ok(SearchResult { id, filename, text, score })
}

fn required_string(map: &Map<String, Value>, key: &str) -> Result<String, NormalizationError> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(NormalizationError::InvalidRecord {
            key: key.to_string(),
            reason: format!("expected string, found {}", json_type(other)),
        }),
        None => Err(NormalizationError::InvalidRecord { key: key.to_string(), reason: "missing".to_string() }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("a.md", "a.md", "alpha"),
            Document::new("b.md", "b.md", "beta"),
            Document::new("c.md", "c.md", "gamma"),
        ]
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_three_shapes_are_equivalent() {
        let docs = docs();
        let positions = normalize_value(&json!([2, 0]), &docs).unwrap();
        let pairs = normalize_value(&json!([[2, 0.9], [0, 0.5]]), &docs).unwrap();
        let records = normalize_value(
            &json!([
                {"id": "c.md", "filename": "c.md", "text": "gamma"},
                {"id": "a.md", "filename": "a.md", "text": "alpha"}
            ]),
            &docs,
        )
        .unwrap();

        assert_eq!(ids(&positions), vec!["c.md", "a.md"]);
        assert_eq!(ids(&pairs), ids(&positions));
        assert_eq!(ids(&records), ids(&positions));
        assert_eq!(positions, records);
        assert_eq!(pairs[0].score, Some(0.9));
        assert_eq!(pairs[1].score, Some(0.5));
    }

    #[test]
    fn test_out_of_range_positions_are_skipped() {
        let results = normalize_value(&json!([5, -1, 1, [9, 0.3]]), &docs()).unwrap();
        assert_eq!(ids(&results), vec!["b.md"]);
    }

    #[test]
    fn test_unrecognized_element_names_its_type() {
        let err = normalize_value(&json!([0, "b.md"]), &docs()).unwrap_err();
        assert_eq!(err, NormalizationError::UnrecognizedShape { position: 1, element_type: "string" });
        assert!(err.to_string().contains("string"));

        let err = classify(&json!([1.5])).unwrap_err();
        assert!(err.to_string().contains("float"));

        let err = classify(&json!([[1, 0.5, 3]])).unwrap_err();
        assert!(err.to_string().contains("array"));

        let err = classify(&json!([null])).unwrap_err();
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_non_sequence_is_rejected() {
        let err = classify(&json!({"hits": []})).unwrap_err();
        assert_eq!(err, NormalizationError::NotASequence { found: "object" });
    }

    #[test]
    fn test_record_is_revalidated() {
        let err = normalize_value(&json!([{"id": "a.md", "text": "alpha"}]), &docs()).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidRecord { ref key, .. } if key == "filename"));

        let err = normalize_value(&json!([{"id": 1, "filename": "a", "text": "t"}]), &docs()).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidRecord { ref key, .. } if key == "id"));

        let err =
            normalize_value(&json!([{"id": "a", "filename": "a", "text": "t", "score": "high"}]), &docs()).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidRecord { ref key, .. } if key == "score"));
    }

    #[test]
    fn test_record_keeps_score() {
        let results =
            normalize_value(&json!([{"id": "x", "filename": "x", "text": "t", "score": 1.25}]), &docs()).unwrap();
        assert_eq!(results[0].score, Some(1.25));
    }

    #[test]
    fn test_empty_output_normalizes_to_empty() {
        assert!(normalize_value(&json!([]), &docs()).unwrap().is_empty());
    }
}
