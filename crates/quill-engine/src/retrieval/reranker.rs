use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::index::types::Candidate;
use crate::llm::provider::EmbeddingProvider;
use crate::query::ParsedQuery;
use crate::retrieval::filter::passes_filters;
use crate::retrieval::pipeline::PipelineEvent;

/// Sentinel for chunks whose content is empty after sanitization; they are
/// never sent to the embedding service.
pub const SKIPPED_SCORE: f32 = -100.0;
/// Sentinel for chunks whose embedding call failed; they sort to the bottom
/// without aborting the batch.
pub const FAILED_SCORE: f32 = -999.0;

const KEYWORD_WEIGHT: f32 = 0.1;
const SIMILARITY_WEIGHT: f32 = 10.0;
const TAG_BOOST: f32 = 100.0;

/// A lexical candidate augmented with semantic similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: String,
    pub content: String,
    pub path: String,
    pub keyword_score: f32,
    /// Cosine similarity in [-1, 1], or 0 when skipped/failed.
    pub similarity: f32,
    pub final_score: f32,
    pub chunk_len: usize,
}

/// One vault file in the final ranking: the best-scoring chunk represents
/// the document, all constituent chunks ride along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDocument {
    pub path: String,
    pub content: String,
    pub keyword_score: f32,
    pub final_score: f32,
    pub similarity: f32,
    pub chunks: Vec<ScoredChunk>,
}

/// Reranker configuration knobs, lifted from [`crate::config::SearchConfig`].
#[derive(Debug, Clone)]
pub struct RerankOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub chunk_cutoff: usize,
    pub doc_cutoff: usize,
    pub fallback_limit: usize,
}

impl Default for RerankOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            batch_delay: Duration::from_millis(50),
            chunk_cutoff: 50,
            doc_cutoff: 20,
            fallback_limit: 12,
        }
    }
}

/// Orchestrates batched, rate-limited embedding calls and fuses lexical and
/// semantic scores into a document-level ranking.
pub struct Reranker {
    embedder: Arc<dyn EmbeddingProvider>,
    options: RerankOptions,
}

impl Reranker {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, options: RerankOptions) -> Self {
        Self { embedder, options }
    }

    /// Rerank lexical candidates against the query. Emits cumulative
    /// progress after every batch; `current` reaches `total` exactly once.
    /// A dropped event receiver cancels the run: no further embedding
    /// calls are made and an empty ranking is returned.
    ///
    /// Any failure outside per-item embedding (e.g. embedding the query
    /// itself) degrades to the first `fallback_limit` candidates in lexical
    /// order rather than propagating.
    pub async fn rerank(
        &self,
        query: &str,
        parsed: &ParsedQuery,
        candidates: Vec<Candidate>,
        events: &mpsc::Sender<PipelineEvent>,
    ) -> Vec<RankedDocument> {
        if candidates.is_empty() {
            return Vec::new();
        }

        match self.rerank_inner(query, parsed, &candidates, events).await {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!(error = %e, "Rerank failed, falling back to lexical order");
                candidates
                    .into_iter()
                    .take(self.options.fallback_limit)
                    .map(|c| {
                        let chunk = ScoredChunk {
                            chunk_len: c.content.len(),
                            id: c.id,
                            content: c.content,
                            path: c.path,
                            keyword_score: c.keyword_score,
                            similarity: 0.0,
                            final_score: c.keyword_score,
                        };
                        RankedDocument {
                            path: chunk.path.clone(),
                            content: chunk.content.clone(),
                            keyword_score: chunk.keyword_score,
                            final_score: chunk.final_score,
                            similarity: 0.0,
                            chunks: vec![chunk],
                        }
                    })
                    .collect()
            }
        }
    }

    async fn rerank_inner(
        &self,
        query: &str,
        parsed: &ParsedQuery,
        candidates: &[Candidate],
        events: &mpsc::Sender<PipelineEvent>,
    ) -> Result<Vec<RankedDocument>> {
        if events.is_closed() {
            debug!("Event receiver dropped before rerank started");
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;

        let total = candidates.len();
        let batch_size = self.options.batch_size.max(1);
        let mut scored: Vec<ScoredChunk> = Vec::with_capacity(total);
        let mut processed = 0usize;

        for batch in candidates.chunks(batch_size) {
            let futures = batch.iter().map(|c| self.score_chunk(c, &query_vec));
            scored.extend(futures::future::join_all(futures).await);

            processed += batch.len();
            if events
                .send(PipelineEvent::Progress {
                    current: processed,
                    total,
                })
                .await
                .is_err()
            {
                // Caller abandoned the query; stop embedding the rest
                debug!(processed, total, "Event receiver dropped, aborting rerank");
                return Ok(Vec::new());
            }

            if processed < total {
                tokio::time::sleep(self.options.batch_delay).await;
            }
        }

        sort_by_score(&mut scored);

        if parsed.has_filters() {
            scored.retain(|chunk| passes_filters(&chunk.path, &chunk.content, parsed));
        }

        if !parsed.tags.is_empty() {
            apply_tag_boost(&mut scored, &parsed.tags);
            sort_by_score(&mut scored);
        }

        scored.truncate(self.options.chunk_cutoff);

        let mut docs = group_by_path(scored);
        docs.truncate(self.options.doc_cutoff);
        debug!(documents = docs.len(), "Rerank complete");
        Ok(docs)
    }

    /// Score one candidate. Per-item embedding failure is recovered locally
    /// with a sentinel; it must never abort the batch.
    async fn score_chunk(&self, candidate: &Candidate, query_vec: &[f32]) -> ScoredChunk {
        let content = sanitize(&candidate.content);

        let (similarity, final_score) = if content.is_empty() {
            (0.0, SKIPPED_SCORE)
        } else {
            match self.embedder.embed(&content).await {
                Ok(vec) => {
                    let similarity = cosine_similarity(query_vec, &vec);
                    (
                        similarity,
                        candidate.keyword_score * KEYWORD_WEIGHT + similarity * SIMILARITY_WEIGHT,
                    )
                }
                Err(e) => {
                    warn!(chunk_id = %candidate.id, error = %e, "Embedding failed for chunk");
                    (0.0, FAILED_SCORE)
                }
            }
        };

        ScoredChunk {
            id: candidate.id.clone(),
            chunk_len: content.len(),
            content: candidate.content.clone(),
            path: candidate.path.clone(),
            keyword_score: candidate.keyword_score,
            similarity,
            final_score,
        }
    }
}

/// Strip null bytes and surrounding whitespace before embedding.
fn sanitize(content: &str) -> String {
    content.replace('\0', "").trim().to_string()
}

fn sort_by_score(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Multiply the score of every chunk whose content contains a queried tag
/// (case-insensitive, hash prefix included).
fn apply_tag_boost(chunks: &mut [ScoredChunk], tags: &[String]) {
    let tags_lower: Vec<String> = tags.iter().map(|t| t.to_lowercase()).collect();
    for chunk in chunks.iter_mut() {
        let content_lower = chunk.content.to_lowercase();
        if tags_lower.iter().any(|t| content_lower.contains(t)) {
            chunk.final_score *= TAG_BOOST;
        }
    }
}

/// Group top chunks by source path. The max-scoring member represents the
/// document (ties broken by encounter order); groups are sorted by that
/// representative score.
fn group_by_path(chunks: Vec<ScoredChunk>) -> Vec<RankedDocument> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ScoredChunk>> = HashMap::new();

    for chunk in chunks {
        if !groups.contains_key(&chunk.path) {
            order.push(chunk.path.clone());
        }
        groups.entry(chunk.path.clone()).or_default().push(chunk);
    }

    let mut docs: Vec<RankedDocument> = order
        .into_iter()
        .map(|path| {
            let chunks = groups.remove(&path).unwrap_or_default();
            let best = chunks
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| {
                    a.final_score
                        .partial_cmp(&b.final_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        // On ties, keep the earliest-encountered chunk
                        .then(ib.cmp(ia))
                })
                .map(|(_, c)| c.clone())
                .unwrap_or_else(|| ScoredChunk {
                    id: String::new(),
                    content: String::new(),
                    path: path.clone(),
                    keyword_score: 0.0,
                    similarity: 0.0,
                    final_score: 0.0,
                    chunk_len: 0,
                });

            RankedDocument {
                path,
                content: best.content.clone(),
                keyword_score: best.keyword_score,
                final_score: best.final_score,
                similarity: best.similarity,
                chunks,
            }
        })
        .collect();

    docs.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    docs
}

/// Dot product over the product of magnitudes; 0 for degenerate inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !norm_a.is_finite() || !norm_b.is_finite() || norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let sim = dot / (norm_a * norm_b);
    if sim.is_finite() {
        sim
    } else {
        0.0
    }
}
