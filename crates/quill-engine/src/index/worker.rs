use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SearchTuning;
use crate::error::EngineError;
use crate::index::inverted::InvertedIndex;
use crate::index::tokenizer::CjkSegmenter;
use crate::index::types::{Candidate, DocumentMeta};

/// Default result count when a `search` command leaves `top_k` unset.
pub const DEFAULT_SEARCH_TOP_K: usize = 30;

/// Commands accepted by the index worker. Payload shapes are concrete per
/// command; decoding happens at the message boundary, never inside the
/// index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IndexCommand {
    Init,
    Index {
        id: String,
        content: String,
        meta: DocumentMeta,
    },
    Delete {
        path: String,
    },
    Search {
        query: String,
        top_k: Option<usize>,
    },
}

/// One request travelling to the worker, tagged with a correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: Uuid,
    #[serde(flatten)]
    pub command: IndexCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Successful payloads, one variant per command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseData {
    Ready,
    Indexed,
    Deleted { removed: usize },
    Hits(Vec<Candidate>),
}

/// Exactly one response per request, correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: Uuid,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    fn success(id: Uuid, data: ResponseData) -> Self {
        Self {
            id,
            status: ResponseStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    fn error(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id,
            status: ResponseStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Caller-side handle to the index worker.
///
/// Requests carry a fresh uuid; a router task resolves responses back to
/// their oneshot waiters through the pending map. Entries are removed on
/// resolve and on timeout, so outstanding-request tracking never grows
/// without bound.
#[derive(Clone)]
pub struct IndexHandle {
    cmd_tx: mpsc::Sender<CommandEnvelope>,
    pending: Arc<DashMap<Uuid, oneshot::Sender<ResponseEnvelope>>>,
    timeout: Duration,
}

impl IndexHandle {
    /// Send one command and await its correlated response.
    pub async fn request(&self, command: IndexCommand) -> Result<ResponseData, EngineError> {
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if self
            .cmd_tx
            .send(CommandEnvelope { id, command })
            .await
            .is_err()
        {
            self.pending.remove(&id);
            return Err(EngineError::WorkerClosed);
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                self.pending.remove(&id);
                return Err(EngineError::WorkerClosed);
            }
            Err(_) => {
                // The worker may still answer later; the router drops the
                // reply once the pending entry is gone.
                self.pending.remove(&id);
                return Err(EngineError::Timeout(self.timeout));
            }
        };

        match response.status {
            ResponseStatus::Success => Ok(response
                .data
                .unwrap_or(ResponseData::Ready)),
            ResponseStatus::Error => Err(EngineError::Rejected(
                response.error.unwrap_or_else(|| "unknown error".into()),
            )),
        }
    }

    /// Upsert one chunk.
    pub async fn index(
        &self,
        id: String,
        content: String,
        meta: DocumentMeta,
    ) -> Result<(), EngineError> {
        self.request(IndexCommand::Index { id, content, meta })
            .await
            .map(|_| ())
    }

    /// Remove all chunks for a source path. Returns the removed count.
    pub async fn delete(&self, path: String) -> Result<usize, EngineError> {
        match self.request(IndexCommand::Delete { path }).await? {
            ResponseData::Deleted { removed } => Ok(removed),
            _ => Ok(0),
        }
    }

    /// Keyword search; `top_k` defaults to [`DEFAULT_SEARCH_TOP_K`].
    pub async fn search(
        &self,
        query: String,
        top_k: Option<usize>,
    ) -> Result<Vec<Candidate>, EngineError> {
        match self.request(IndexCommand::Search { query, top_k }).await? {
            ResponseData::Hits(hits) => Ok(hits),
            _ => Ok(Vec::new()),
        }
    }
}

/// Spawn the index worker and its response router. The worker solely owns
/// the [`InvertedIndex`]; every mutation and read arrives through the
/// command channel, so index access is serialized by construction.
pub fn spawn_index_worker(
    tuning: SearchTuning,
    segmenter: Arc<dyn CjkSegmenter>,
    timeout: Duration,
) -> IndexHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<CommandEnvelope>(256);
    let (resp_tx, mut resp_rx) = mpsc::channel::<ResponseEnvelope>(256);
    let pending: Arc<DashMap<Uuid, oneshot::Sender<ResponseEnvelope>>> =
        Arc::new(DashMap::new());

    // Worker: owns the index, answers every request exactly once.
    tokio::spawn(async move {
        let mut index = InvertedIndex::new(tuning, segmenter);
        info!("Index worker started");

        while let Some(envelope) = cmd_rx.recv().await {
            let response = handle_command(&mut index, envelope.id, envelope.command);
            if resp_tx.send(response).await.is_err() {
                break; // router gone, nothing left to answer to
            }
        }
        info!("Index worker stopped");
    });

    // Router: correlates responses back to pending waiters.
    let router_pending = pending.clone();
    tokio::spawn(async move {
        while let Some(response) = resp_rx.recv().await {
            match router_pending.remove(&response.id) {
                Some((_, tx)) => {
                    let _ = tx.send(response);
                }
                None => {
                    // Waiter timed out or gave up; discard.
                    debug!(id = %response.id, "Dropping unclaimed worker response");
                }
            }
        }
    });

    IndexHandle {
        cmd_tx,
        pending,
        timeout,
    }
}

/// Process one command. A malformed payload yields an error response and
/// leaves the index usable for subsequent requests.
fn handle_command(index: &mut InvertedIndex, id: Uuid, command: IndexCommand) -> ResponseEnvelope {
    match command {
        IndexCommand::Init => ResponseEnvelope::success(id, ResponseData::Ready),
        IndexCommand::Index {
            id: doc_id,
            content,
            meta,
        } => {
            if doc_id.is_empty() {
                return ResponseEnvelope::error(id, "document id must not be empty");
            }
            if meta.path.is_empty() {
                return ResponseEnvelope::error(id, "document path must not be empty");
            }
            index.upsert(crate::index::types::IndexedDocument {
                id: doc_id,
                content,
                meta,
            });
            ResponseEnvelope::success(id, ResponseData::Indexed)
        }
        IndexCommand::Delete { path } => {
            let removed = index.delete_by_path(&path);
            ResponseEnvelope::success(id, ResponseData::Deleted { removed })
        }
        IndexCommand::Search { query, top_k } => {
            let top_k = top_k.unwrap_or(DEFAULT_SEARCH_TOP_K);
            let hits = index.search(&query, top_k);
            if hits.is_empty() {
                debug!(query = %query, "Search returned no hits");
            }
            ResponseEnvelope::success(id, ResponseData::Hits(hits))
        }
    }
}

/// Convenience: worker with default tuning and no CJK backend.
pub fn spawn_default_worker(timeout: Duration) -> IndexHandle {
    spawn_index_worker(
        SearchTuning::default(),
        Arc::new(crate::index::tokenizer::NoopSegmenter),
        timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str) -> DocumentMeta {
        DocumentMeta {
            basename: path.to_string(),
            path: path.to_string(),
            mtime: chrono::Utc::now().timestamp_millis(),
            ..DocumentMeta::default()
        }
    }

    #[tokio::test]
    async fn test_init_round_trip() {
        let handle = spawn_default_worker(Duration::from_secs(5));
        let data = handle.request(IndexCommand::Init).await.unwrap();
        assert!(matches!(data, ResponseData::Ready));
    }

    #[tokio::test]
    async fn test_index_then_search() {
        let handle = spawn_default_worker(Duration::from_secs(5));
        handle
            .index("a.md::0".into(), "quarterly planning notes".into(), meta("a.md"))
            .await
            .unwrap();

        let hits = handle.search("planning".into(), None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a.md::0");
    }

    #[tokio::test]
    async fn test_delete_reports_count_and_clears_hits() {
        let handle = spawn_default_worker(Duration::from_secs(5));
        handle
            .index("a.md::0".into(), "alpha".into(), meta("a.md"))
            .await
            .unwrap();
        handle
            .index("a.md::1".into(), "beta".into(), meta("a.md"))
            .await
            .unwrap();

        assert_eq!(handle.delete("a.md".into()).await.unwrap(), 2);
        assert_eq!(handle.delete("a.md".into()).await.unwrap(), 0);
        assert!(handle.search("alpha".into(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected_worker_survives() {
        let handle = spawn_default_worker(Duration::from_secs(5));

        let err = handle
            .index(String::new(), "content".into(), meta("a.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));

        // Worker must remain usable afterwards
        handle
            .index("a.md::0".into(), "still alive".into(), meta("a.md"))
            .await
            .unwrap();
        assert_eq!(handle.search("alive".into(), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_cleans_pending_and_is_distinct() {
        // A handle whose command channel is never drained: requests must
        // time out rather than hang, and the pending map must be cleaned.
        let (cmd_tx, _cmd_rx) = mpsc::channel::<CommandEnvelope>(1);
        let handle = IndexHandle {
            cmd_tx,
            pending: Arc::new(DashMap::new()),
            timeout: Duration::from_millis(20),
        };

        let err = handle.search("anything".into(), None).await.unwrap_err();
        assert!(matches!(err, EngineError::Timeout(_)));
        assert!(handle.pending.is_empty());
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let handle = spawn_default_worker(Duration::from_secs(5));
        let hits = handle.search("nothing indexed".into(), None).await.unwrap();
        assert!(hits.is_empty());
    }
}
