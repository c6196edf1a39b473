//! In-memory search index over canonical documents.
//!
//! Text fields are scored with BM25 over lowercase word tokens; keyword
//! fields support exact-match filtering. A query may combine both (hybrid
//! search): filters narrow the candidate set, text scoring ranks it.
//!
//! The index is built once and never mutated afterwards, so a shared
//! reference can serve concurrent queries.

pub mod tokenize;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::document::{Document, Field};
use crate::normalize::RawHit;

pub use tokenize::tokenize;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Default number of hits returned by a query.
pub const DEFAULT_LIMIT: usize = 5;

/// Builder for [`Index`], naming which fields are searchable.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    text_fields: Vec<Field>,
    keyword_fields: Vec<Field>,
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self { text_fields: vec![Field::Text, Field::Filename], keyword_fields: vec![Field::Filename] }
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields scored for free-text queries.
    pub fn text_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.text_fields = dedup(fields);
        self
    }

    /// Fields available for exact-match filters.
    pub fn keyword_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.keyword_fields = dedup(fields);
        self
    }

    /// Whether `index` was built with this builder's field configuration.
    pub fn is_compatible(&self, index: &Index) -> bool {
        index.text_fields == self.text_fields && index.keyword_fields == self.keyword_fields
    }

    /// Build an index over `documents`, preserving their order.
    ///
    /// Documents with blank text or an id already seen are skipped, so the
    /// index upholds its invariants even for unsanitized input. An empty
    /// input yields a valid, empty index.
    pub fn build(self, documents: Vec<Document>) -> Index {
        let mut seen = HashSet::new();
        let documents: Vec<Document> = documents
            .into_iter()
            .filter(|doc| {
                if doc.text.trim().is_empty() {
                    tracing::warn!(id = %doc.id, "skipping document with blank text");
                    return false;
                }
                if !seen.insert(doc.id.clone()) {
                    tracing::warn!(id = %doc.id, "skipping duplicate document id");
                    return false;
                }
                true
            })
            .collect();

        let text_stats = self.text_fields.iter().map(|field| FieldStats::build(*field, &documents)).collect();
        let keywords = self.keyword_fields.iter().map(|field| KeywordColumn::build(*field, &documents)).collect();

        tracing::debug!(
            documents = documents.len(),
            text_fields = ?self.text_fields,
            keyword_fields = ?self.keyword_fields,
            "built index"
        );

        Index { text_fields: self.text_fields, keyword_fields: self.keyword_fields, documents, text_stats, keywords }
    }
}

/// A query against an [`Index`].
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free-text query.
    pub text: String,
    /// Text fields to score. Empty means every indexed text field.
    pub fields: Vec<Field>,
    /// Exact-match filters; a document must satisfy all of them.
    pub filters: Vec<(Field, String)>,
    /// Per-field score multipliers (default 1.0).
    pub boosts: Vec<(Field, f64)>,
    /// Maximum number of hits.
    pub limit: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), fields: Vec::new(), filters: Vec::new(), boosts: Vec::new(), limit: DEFAULT_LIMIT }
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    pub fn filter(mut self, field: Field, value: impl Into<String>) -> Self {
        self.filters.push((field, value.into()));
        self
    }

    pub fn boost(mut self, field: Field, factor: f64) -> Self {
        self.boosts.push((field, factor));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn boost_for(&self, field: Field) -> f64 {
        self.boosts.iter().rev().find(|(f, _)| *f == field).map_or(1.0, |(_, b)| *b)
    }
}

/// Searchable, immutable index over a document set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    text_fields: Vec<Field>,
    keyword_fields: Vec<Field>,
    documents: Vec<Document>,
    text_stats: Vec<FieldStats>,
    keywords: Vec<KeywordColumn>,
}

impl Index {
    /// Documents in insertion order; positions in [`RawHit`]s refer to this slice.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn text_fields(&self) -> &[Field] {
        &self.text_fields
    }

    pub fn keyword_fields(&self) -> &[Field] {
        &self.keyword_fields
    }

    /// Whether this index was built over exactly `docs`, in order.
    pub fn covers(&self, docs: &[Document]) -> bool {
        self.documents == docs
    }

    /// Run a query, returning up to `limit` scored hits.
    ///
    /// Hits are ordered by descending score; equal scores keep insertion
    /// order. Requested fields that are not indexed text fields are ignored.
    /// Only documents with a positive score are returned.
    pub fn search(&self, query: &SearchQuery) -> Vec<RawHit> {
        if query.limit == 0 || self.documents.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let terms: Vec<String> = tokenize(&query.text).into_iter().filter(|t| seen.insert(t.clone())).collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let stats: Vec<&FieldStats> = self
            .text_stats
            .iter()
            .filter(|s| query.fields.is_empty() || query.fields.contains(&s.field))
            .collect();
        if stats.is_empty() {
            tracing::debug!(fields = ?query.fields, "no indexed text fields requested");
            return Vec::new();
        }

        let candidates = self.filter_candidates(&query.filters);

        let mut scored: Vec<(usize, f64)> = candidates
            .into_iter()
            .filter_map(|pos| {
                let score: f64 = stats.iter().map(|s| query.boost_for(s.field) * s.bm25(&terms, pos)).sum();
                (score > 0.0).then_some((pos, score))
            })
            .collect();

        // stable: ties keep insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(query.limit);

        scored.into_iter().map(|(pos, score)| RawHit::Scored(pos as i64, score)).collect()
    }

    /// Positions of documents that satisfy every filter, ascending.
    fn filter_candidates(&self, filters: &[(Field, String)]) -> Vec<usize> {
        (0..self.documents.len())
            .filter(|pos| {
                filters.iter().all(|(field, value)| match self.keywords.iter().find(|k| k.field == *field) {
                    Some(column) => column.matches(value, *pos),
                    None => self.documents[*pos].field(*field) == value,
                })
            })
            .collect()
    }
}

/// BM25 statistics for one text field.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldStats {
    field: Field,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<u32>,
    doc_freqs: HashMap<String, u32>,
    avg_len: f64,
}

impl FieldStats {
    fn build(field: Field, documents: &[Document]) -> Self {
        let mut term_freqs = Vec::with_capacity(documents.len());
        let mut doc_lens = Vec::with_capacity(documents.len());
        let mut doc_freqs: HashMap<String, u32> = HashMap::new();

        for doc in documents {
            let tokens = tokenize(doc.field(field));
            doc_lens.push(tokens.len() as u32);

            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for token in tf.keys() {
                *doc_freqs.entry(token.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let total: u64 = doc_lens.iter().map(|len| u64::from(*len)).sum();
        let avg_len = if documents.is_empty() { 0.0 } else { total as f64 / documents.len() as f64 };

        Self { field, term_freqs, doc_lens, doc_freqs, avg_len }
    }

    fn bm25(&self, terms: &[String], pos: usize) -> f64 {
        let n = self.doc_lens.len() as f64;
        let doc_len = f64::from(self.doc_lens[pos]);
        if doc_len == 0.0 {
            return 0.0;
        }
        let length_norm = 1.0 - BM25_B + BM25_B * doc_len / self.avg_len.max(1.0);

        terms
            .iter()
            .filter_map(|term| {
                let tf = f64::from(*self.term_freqs[pos].get(term)?);
                let df = f64::from(self.doc_freqs.get(term).copied().unwrap_or(0));
                let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p().max(0.0);
                Some(idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * length_norm))
            })
            .sum()
    }
}

/// Exact-match lookup table for one keyword field.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeywordColumn {
    field: Field,
    values: HashMap<String, Vec<usize>>,
}

impl KeywordColumn {
    fn build(field: Field, documents: &[Document]) -> Self {
        let mut values: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, doc) in documents.iter().enumerate() {
            values.entry(doc.field(field).to_string()).or_default().push(pos);
        }
        Self { field, values }
    }

    fn matches(&self, value: &str, pos: usize) -> bool {
        self.values.get(value).is_some_and(|positions| positions.binary_search(&pos).is_ok())
    }
}

fn dedup(fields: impl IntoIterator<Item = Field>) -> Vec<Field> {
    let mut out = Vec::new();
    for field in fields {
        if !out.contains(&field) {
            out.push(field);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("docker/README.md", "README.md", "Docker containers and images. Build images with docker."),
            Document::new("k8s/pods.md", "pods.md", "Kubernetes pods run containers."),
            Document::new("linux/README.md", "README.md", "Linux processes, signals and the kernel."),
            Document::new("git/branches.md", "branches.md", "Git branches and merges."),
        ]
    }

    fn positions(hits: &[RawHit]) -> Vec<i64> {
        hits.iter()
            .map(|hit| match hit {
                RawHit::Scored(pos, _) => *pos,
                other => panic!("unexpected hit {other:?}"),
            })
            .collect()
    }

    #[test]
    fn test_empty_index_is_queryable() {
        let index = IndexBuilder::new().build(Vec::new());
        assert!(index.is_empty());
        assert!(index.search(&SearchQuery::new("docker")).is_empty());
    }

    #[test]
    fn test_search_ranks_by_relevance() {
        let index = IndexBuilder::new().build(docs());
        let hits = index.search(&SearchQuery::new("docker images"));
        assert_eq!(positions(&hits), vec![0]);

        let hits = index.search(&SearchQuery::new("containers"));
        assert_eq!(positions(&hits).len(), 2);
        assert!(positions(&hits).contains(&0));
        assert!(positions(&hits).contains(&1));
    }

    #[test]
    fn test_scores_descend() {
        let index = IndexBuilder::new().build(docs());
        let hits = index.search(&SearchQuery::new("containers docker kernel git").limit(10));
        let scores: Vec<f64> = hits
            .iter()
            .map(|hit| match hit {
                RawHit::Scored(_, score) => *score,
                _ => unreachable!(),
            })
            .collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let docs = vec![
            Document::new("a.md", "a.md", "alpha beta"),
            Document::new("b.md", "b.md", "gamma delta"),
            Document::new("c.md", "c.md", "alpha beta"),
        ];
        let index = IndexBuilder::new().text_fields([Field::Text]).build(docs);
        let hits = index.search(&SearchQuery::new("alpha"));
        assert_eq!(positions(&hits), vec![0, 2]);
    }

    #[test]
    fn test_limit_caps_results() {
        let index = IndexBuilder::new().build(docs());
        assert_eq!(index.search(&SearchQuery::new("readme").limit(1)).len(), 1);
        assert!(index.search(&SearchQuery::new("readme").limit(0)).is_empty());
    }

    #[test]
    fn test_field_selection() {
        let index = IndexBuilder::new().build(docs());
        // "readme" only appears in filenames
        assert!(index.search(&SearchQuery::new("readme").fields([Field::Text])).is_empty());
        assert_eq!(index.search(&SearchQuery::new("readme").fields([Field::Filename])).len(), 2);
        // id is not an indexed text field
        assert!(index.search(&SearchQuery::new("docker").fields([Field::Id])).is_empty());
    }

    #[test]
    fn test_keyword_filter_narrows_candidates() {
        let index = IndexBuilder::new().build(docs());
        let hits = index.search(&SearchQuery::new("linux docker").filter(Field::Filename, "README.md").limit(10));
        assert_eq!(positions(&hits).len(), 2);

        let hits = index.search(&SearchQuery::new("docker").filter(Field::Filename, "pods.md"));
        assert!(hits.is_empty());

        // id is not a keyword field here, so it is compared directly
        let hits = index.search(&SearchQuery::new("git").filter(Field::Id, "git/branches.md"));
        assert_eq!(positions(&hits), vec![3]);
    }

    #[test]
    fn test_boost_reorders() {
        let docs = vec![
            Document::new("a.md", "notes.md", "docker docker docker"),
            Document::new("b.md", "docker.md", "unrelated words here"),
        ];
        let index = IndexBuilder::new().build(docs);
        let plain = index.search(&SearchQuery::new("docker"));
        assert_eq!(positions(&plain)[0], 0);

        let boosted = index.search(&SearchQuery::new("docker").boost(Field::Filename, 10.0));
        assert_eq!(positions(&boosted)[0], 1);
    }

    #[test]
    fn test_builder_compatibility() {
        let index = IndexBuilder::new().build(docs());
        assert!(IndexBuilder::new().is_compatible(&index));
        assert!(!IndexBuilder::new().text_fields([Field::Text]).is_compatible(&index));
    }

    #[test]
    fn test_stop_word_query_is_empty() {
        let index = IndexBuilder::new().build(docs());
        assert!(index.search(&SearchQuery::new("what is the")).is_empty());
    }

    #[test]
    fn test_build_enforces_invariants() {
        let index = IndexBuilder::new().build(vec![
            Document::new("a.md", "a.md", "first"),
            Document::new("a.md", "a.md", "second"),
            Document::new("b.md", "b.md", "  "),
        ]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.documents()[0].text, "first");
    }

    #[test]
    fn test_index_survives_bincode() {
        let index = IndexBuilder::new().build(docs());
        let bytes = bincode::serde::encode_to_vec(&index, bincode::config::standard()).unwrap();
        let (decoded, _): (Index, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).unwrap();
        assert!(decoded.covers(index.documents()));
        assert_eq!(
            positions(&decoded.search(&SearchQuery::new("kernel"))),
            positions(&index.search(&SearchQuery::new("kernel")))
        );
    }
}
