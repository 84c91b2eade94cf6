use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::config::SearchTuning;
use crate::index::tokenizer::{tokenize, CjkSegmenter};
use crate::index::types::{Candidate, CandidateSource, Field, IndexedDocument};

/// Per-document entry kept alongside the postings for result assembly.
#[derive(Debug, Clone)]
struct DocEntry {
    content: String,
    path: String,
    mtime: i64,
}

/// Term frequencies per field for one (term, document) pair.
type FieldCounts = HashMap<Field, u32>;

/// In-memory inverted index over document chunks.
///
/// Field-based postings with query-time boosts, length-dependent fuzzy and
/// prefix matching, and a recency multiplier. Single-owner: all access is
/// serialized through the worker task, so no interior locking is needed.
pub struct InvertedIndex {
    tuning: SearchTuning,
    segmenter: Arc<dyn CjkSegmenter>,
    docs: HashMap<String, DocEntry>,
    by_path: HashMap<String, HashSet<String>>,
    postings: HashMap<String, HashMap<String, FieldCounts>>,
}

impl InvertedIndex {
    pub fn new(tuning: SearchTuning, segmenter: Arc<dyn CjkSegmenter>) -> Self {
        Self {
            tuning,
            segmenter,
            docs: HashMap::new(),
            by_path: HashMap::new(),
            postings: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Insert or replace a document by id. Re-indexing an existing id swaps
    /// its postings in place; the document count never grows on re-upsert.
    pub fn upsert(&mut self, doc: IndexedDocument) {
        if self.docs.contains_key(&doc.id) {
            self.remove_id(&doc.id);
        }

        for field in Field::ALL {
            let text = self.field_text(&doc, field);
            if text.is_empty() {
                continue;
            }
            for token in tokenize(&text, self.segmenter.as_ref()) {
                let counts = self
                    .postings
                    .entry(token)
                    .or_default()
                    .entry(doc.id.clone())
                    .or_default();
                *counts.entry(field).or_insert(0) += 1;
            }
        }

        self.by_path
            .entry(doc.meta.path.clone())
            .or_default()
            .insert(doc.id.clone());
        self.docs.insert(
            doc.id,
            DocEntry {
                content: doc.content,
                path: doc.meta.path,
                mtime: doc.meta.mtime,
            },
        );
    }

    /// Remove every chunk whose source path matches. Returns how many were
    /// removed; zero is a valid outcome, not an error.
    pub fn delete_by_path(&mut self, path: &str) -> usize {
        let Some(ids) = self.by_path.remove(path) else {
            return 0;
        };
        let removed = ids.len();
        for id in ids {
            self.remove_postings(&id);
            self.docs.remove(&id);
        }
        debug!(path = %path, removed, "Removed documents by path");
        removed
    }

    /// Keyword search, best-first.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Candidate> {
        let terms = tokenize(query, self.segmenter.as_ref());
        if terms.is_empty() {
            return Vec::new();
        }

        let now_ms = Utc::now().timestamp_millis();
        let mut scores: HashMap<&str, f32> = HashMap::new();

        for term in &terms {
            for (matched_term, quality) in self.matching_terms(term) {
                let Some(docs) = self.postings.get(matched_term) else {
                    continue;
                };
                for (id, counts) in docs {
                    let mut contribution = 0.0f32;
                    for (&field, &tf) in counts {
                        contribution += self.tuning.boost(field) * tf as f32;
                    }
                    *scores.entry(id.as_str()).or_default() += quality * contribution;
                }
            }
        }

        let mut ranked: Vec<(&str, f32)> = scores
            .into_iter()
            .map(|(id, score)| {
                let entry = &self.docs[id];
                (id, score * recency_boost(entry.mtime, now_ms))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);

        ranked
            .into_iter()
            .map(|(id, score)| {
                let entry = &self.docs[id];
                Candidate {
                    id: id.to_string(),
                    content: entry.content.clone(),
                    path: entry.path.clone(),
                    keyword_score: score,
                    source: CandidateSource::Keyword,
                }
            })
            .collect()
    }

    /// Index terms matching one query term, with a match-quality factor:
    /// exact = 1.0; prefix scaled by length ratio; fuzzy scaled by edit
    /// distance. Tolerances are proportional to term length and rounded up,
    /// so terms of length <= 3 only ever match exactly.
    fn matching_terms<'a>(&'a self, term: &str) -> Vec<(&'a str, f32)> {
        let term_len = term.chars().count();
        let tolerance = self.tuning.fuzzy_tolerance(term_len);
        let max_edits = if tolerance > 0.0 {
            (term_len as f32 * tolerance).ceil() as usize
        } else {
            0
        };
        let allow_prefix = term_len >= self.tuning.min_prefix_len;

        let mut matches = Vec::new();
        for indexed in self.postings.keys() {
            if indexed == term {
                matches.push((indexed.as_str(), 1.0));
                continue;
            }
            if allow_prefix && indexed.starts_with(term) {
                let ratio = term_len as f32 / indexed.chars().count() as f32;
                matches.push((indexed.as_str(), 0.5 * ratio));
                continue;
            }
            if max_edits > 0 {
                if let Some(dist) = edit_distance_capped(term, indexed, max_edits) {
                    let quality = 0.8 * (1.0 - dist as f32 / term_len as f32).max(0.0);
                    matches.push((indexed.as_str(), quality));
                }
            }
        }
        matches
    }

    fn field_text(&self, doc: &IndexedDocument, field: Field) -> String {
        match field {
            Field::Basename => doc.meta.basename.clone(),
            Field::Aliases => doc.meta.aliases.join(" "),
            Field::Tags => doc.meta.tags.join(" "),
            Field::H1 => doc.meta.h1.clone(),
            Field::H2 => doc.meta.h2.clone(),
            Field::Links => doc.meta.links.join(" "),
            Field::H3 => doc.meta.h3.clone(),
            Field::Urls => doc.meta.urls.join(" "),
            Field::Path => doc.meta.path.replace(['/', '.'], " "),
            Field::Content => doc.content.clone(),
        }
    }

    fn remove_id(&mut self, id: &str) {
        if let Some(entry) = self.docs.remove(id) {
            if let Some(ids) = self.by_path.get_mut(&entry.path) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_path.remove(&entry.path);
                }
            }
        }
        self.remove_postings(id);
    }

    fn remove_postings(&mut self, id: &str) {
        self.postings.retain(|_, docs| {
            docs.remove(id);
            !docs.is_empty()
        });
    }
}

/// Recency multiplier: `1 + e^(-0.1 * days_since_modified / 1000)`.
///
/// The divisor makes the decay operate over thousands of days; this is the
/// shipped ranking behavior and is preserved literally — changing it
/// reorders results.
pub fn recency_boost(mtime_ms: i64, now_ms: i64) -> f32 {
    let days = ((now_ms - mtime_ms).max(0) as f64) / 86_400_000.0;
    (1.0 + (-0.1 * days / 1000.0).exp()) as f32
}

/// Levenshtein distance, bailing out once `cap` is exceeded.
fn edit_distance_capped(a: &str, b: &str, cap: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.len().abs_diff(b.len()) > cap {
        return None;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(current[j] + 1);
            row_min = row_min.min(current[j + 1]);
        }
        if row_min > cap {
            return None;
        }
        std::mem::swap(&mut prev, &mut current);
    }

    (prev[b.len()] <= cap).then_some(prev[b.len()])
}
