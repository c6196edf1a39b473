//! Canonical document and search result types.
//!
//! Everything downstream of the sanitizer consumes [`Document`]; everything a
//! query hands back to a caller is a [`SearchResult`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A sanitized document from the source tree.
///
/// `id` is the path of the file in the repository and is unique within an
/// index. `text` is never empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), filename: filename.into(), text: text.into() }
    }

    /// Value of one of the designated fields.
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id,
            Field::Filename => &self.filename,
            Field::Text => &self.text,
        }
    }
}

/// A single normalized search hit.
///
/// `score` is absent when the backend that produced the hit does not expose
/// relevance scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchResult {
    pub id: String,
    pub filename: String,
    pub text: String,
    pub score: Option<f64>,
}

impl SearchResult {
    pub fn from_document(doc: &Document, score: Option<f64>) -> Self {
        Self { id: doc.id.clone(), filename: doc.filename.clone(), text: doc.text.clone(), score }
    }

    /// First `max_chars` characters of the text, with an ellipsis when cut.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.text.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() { format!("{head}...") } else { head }
    }
}

/// Document fields an index can be built over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Id,
    Filename,
    Text,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Id, Field::Filename, Field::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Filename => "filename",
            Field::Text => "text",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" | "path" => Ok(Field::Id),
            "filename" | "name" => Ok(Field::Filename),
            "text" | "content" => Ok(Field::Text),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown field: {other} (expected id, filename or text)"
            ))),
        }
    }
}
