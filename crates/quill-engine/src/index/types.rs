use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One searchable chunk of a vault file.
///
/// `id` is `<file_path>::<chunk_index>`; many chunks share one `path`.
/// Deletion is keyed by `path` so a removed or renamed file leaves no
/// orphaned chunks behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
    #[serde(flatten)]
    pub meta: DocumentMeta,
}

/// Metadata supplied by the upstream chunker alongside each chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub basename: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub path: String,
    #[serde(default)]
    pub h1: String,
    #[serde(default)]
    pub h2: String,
    #[serde(default)]
    pub h3: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    /// Modification timestamp, epoch milliseconds.
    #[serde(default)]
    pub mtime: i64,
    #[serde(default)]
    pub frontmatter: HashMap<String, String>,
}

/// A scored chunk surfaced by lexical search. Transient, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub content: String,
    pub path: String,
    pub keyword_score: f32,
    pub source: CandidateSource,
}

/// Which search stage produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
    Keyword,
}

/// Indexable fields with their query-time relevance weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Basename,
    Aliases,
    Tags,
    H1,
    H2,
    Links,
    H3,
    Urls,
    Path,
    Content,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Basename,
        Field::Aliases,
        Field::Tags,
        Field::H1,
        Field::H2,
        Field::Links,
        Field::H3,
        Field::Urls,
        Field::Path,
        Field::Content,
    ];
}
