use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::index::worker::IndexHandle;
use crate::llm::provider::{ChatProvider, EmbeddingProvider};
use crate::llm::types::{Message, StreamChunk};
use crate::query::parse;
use crate::retrieval::reranker::{RankedDocument, RerankOptions, Reranker};

/// Sentinel the triage model emits when the question needs no vault lookup.
const NO_SEARCH_SENTINEL: &str = "NO_SEARCH_NEEDED";

const TRIAGE_PROMPT: &str = r#"You decide whether answering a user's message requires searching their personal note vault, and if so, what to search for.

Rules:
- If the message is a greeting, small talk, or answerable from general knowledge alone, reply with exactly NO_SEARCH_NEEDED.
- Otherwise reply with a search query wrapped in <query></query> tags. Keep filter syntax the user wrote (quoted phrases, #tags, ext:, path:, -path:, -word) intact.

Examples:
User: hi there
Assistant: NO_SEARCH_NEEDED

User: what is the capital of France?
Assistant: NO_SEARCH_NEEDED

User: what did I write about the quarterly review?
Assistant: <query>quarterly review</query>

User: find my #recipe notes about sourdough, not the archived ones
Assistant: <query>sourdough #recipe -path:archive</query>"#;

const ANSWER_PROMPT: &str = "You answer questions using the user's personal notes. \
Base your answer on the provided note excerpts and cite note paths when you use them. \
If the notes do not cover the question, say so before answering from general knowledge.";

/// Incremental output of one `ask` run, in emission order: optional
/// `Thought`, zero or more `Progress`, at most one `Sources`, then `Token`s
/// until `Done` or a terminal `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum PipelineEvent {
    Thought(String),
    Progress { current: usize, total: usize },
    Sources(Vec<RankedDocument>),
    Token(String),
    Done,
    Error(String),
}

/// End-to-end question answering: intent triage, keyword retrieval,
/// semantic rerank, grounded generation.
pub struct RetrievalPipeline {
    chat: Arc<dyn ChatProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: IndexHandle,
    config: SearchConfig,
}

impl RetrievalPipeline {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: IndexHandle,
        config: SearchConfig,
    ) -> Self {
        Self {
            chat,
            embedder,
            index,
            config,
        }
    }

    /// Run the pipeline for one question. Events stream on the returned
    /// channel; the task stops early if the receiver is dropped.
    pub fn ask(&self, question: String) -> mpsc::Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel(64);
        let chat = self.chat.clone();
        let embedder = self.embedder.clone();
        let index = self.index.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            run_pipeline(chat, embedder, index, config, question, tx).await;
        });

        rx
    }
}

async fn run_pipeline(
    chat: Arc<dyn ChatProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: IndexHandle,
    config: SearchConfig,
    question: String,
    tx: mpsc::Sender<PipelineEvent>,
) {
    let search_query = match triage(chat.as_ref(), &question).await {
        Triage::NoSearch => {
            debug!("Triage: answering without retrieval");
            answer(chat.as_ref(), &question, &[], &tx).await;
            return;
        }
        Triage::Search(query) => query,
    };

    if tx
        .send(PipelineEvent::Thought(format!(
            "Searching notes for: {search_query}"
        )))
        .await
        .is_err()
    {
        return;
    }

    let parsed = parse(&search_query);
    let candidates = match index
        .search(parsed.clean_text(), Some(config.candidate_pool))
        .await
    {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(error = %e, "Index search failed");
            let _ = tx.send(PipelineEvent::Error(e.to_string())).await;
            return;
        }
    };

    if candidates.is_empty() {
        // Empty retrieval is a normal outcome, not an error.
        if tx.send(PipelineEvent::Sources(Vec::new())).await.is_err() {
            return;
        }
        answer(chat.as_ref(), &question, &[], &tx).await;
        return;
    }

    info!(candidates = candidates.len(), "Reranking candidates");
    let reranker = Reranker::new(
        embedder,
        RerankOptions {
            batch_size: config.batch_size,
            batch_delay: std::time::Duration::from_millis(config.batch_delay_ms),
            chunk_cutoff: config.chunk_cutoff,
            doc_cutoff: config.doc_cutoff,
            fallback_limit: config.fallback_limit,
        },
    );
    let ranked = reranker
        .rerank(&search_query, &parsed, candidates, &tx)
        .await;

    if tx
        .send(PipelineEvent::Sources(ranked.clone()))
        .await
        .is_err()
    {
        return;
    }

    answer(chat.as_ref(), &question, &ranked, &tx).await;
}

enum Triage {
    NoSearch,
    Search(String),
}

/// Ask the chat model whether retrieval is needed. Degrades to searching
/// with the raw question when the triage call itself fails.
async fn triage(chat: &dyn ChatProvider, question: &str) -> Triage {
    let messages = [Message::system(TRIAGE_PROMPT), Message::user(question)];
    match chat.chat(&messages).await {
        Ok(response) => {
            if response.contains(NO_SEARCH_SENTINEL) {
                return Triage::NoSearch;
            }
            Triage::Search(
                extract_tagged(&response, "query").unwrap_or_else(|| question.to_string()),
            )
        }
        Err(e) => {
            warn!(error = %e, "Triage call failed, searching with raw question");
            Triage::Search(question.to_string())
        }
    }
}

/// Extract the contents of the first `<tag>...</tag>` pair, trimmed.
fn extract_tagged(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    let inner = text[start..end].trim();
    if inner.is_empty() {
        None
    } else {
        Some(inner.to_string())
    }
}

/// Stream the final answer, grounded in ranked documents when present.
/// A chat failure here is terminal for the run.
async fn answer(
    chat: &dyn ChatProvider,
    question: &str,
    sources: &[RankedDocument],
    tx: &mpsc::Sender<PipelineEvent>,
) {
    let messages = build_answer_messages(question, sources);

    let mut stream = match chat.chat_stream(&messages).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Answer generation failed");
            let _ = tx.send(PipelineEvent::Error(e.to_string())).await;
            return;
        }
    };

    while let Some(chunk) = stream.recv().await {
        let event = match chunk {
            StreamChunk::TextDelta(text) => PipelineEvent::Token(text),
            StreamChunk::Done => {
                let _ = tx.send(PipelineEvent::Done).await;
                return;
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }

    // Provider closed the stream without a terminal chunk; still finish.
    let _ = tx.send(PipelineEvent::Done).await;
}

fn build_answer_messages(question: &str, sources: &[RankedDocument]) -> Vec<Message> {
    if sources.is_empty() {
        return vec![Message::system(ANSWER_PROMPT), Message::user(question)];
    }

    let mut context = String::from("Relevant note excerpts:\n");
    for doc in sources {
        context.push_str(&format!("\n--- {} ---\n{}\n", doc.path, doc.content));
    }

    vec![
        Message::system(ANSWER_PROMPT),
        Message::system(&context),
        Message::user(question),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::DocumentMeta;
    use crate::index::worker::spawn_default_worker;
    use crate::llm::embedding::MockEmbedding;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Chat mock: fixed triage reply, fixed streamed answer tokens.
    struct MockChat {
        triage_reply: String,
        answer_tokens: Vec<String>,
        seen_messages: Mutex<Vec<Vec<Message>>>,
    }

    impl MockChat {
        fn new(triage_reply: &str, answer_tokens: &[&str]) -> Self {
            Self {
                triage_reply: triage_reply.to_string(),
                answer_tokens: answer_tokens.iter().map(|s| s.to_string()).collect(),
                seen_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for MockChat {
        async fn chat(&self, messages: &[Message]) -> Result<String> {
            self.seen_messages.lock().unwrap().push(messages.to_vec());
            Ok(self.triage_reply.clone())
        }

        async fn chat_stream(
            &self,
            messages: &[Message],
        ) -> Result<mpsc::Receiver<StreamChunk>> {
            self.seen_messages.lock().unwrap().push(messages.to_vec());
            let (tx, rx) = mpsc::channel(16);
            let tokens = self.answer_tokens.clone();
            tokio::spawn(async move {
                for token in tokens {
                    if tx.send(StreamChunk::TextDelta(token)).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(StreamChunk::Done).await;
            });
            Ok(rx)
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    fn pipeline(chat: MockChat) -> (RetrievalPipeline, IndexHandle) {
        let index = spawn_default_worker(Duration::from_secs(5));
        let config = SearchConfig {
            batch_delay_ms: 0,
            ..SearchConfig::default()
        };
        let p = RetrievalPipeline::new(
            Arc::new(chat),
            Arc::new(MockEmbedding::new(16)),
            index.clone(),
            config,
        );
        (p, index)
    }

    async fn collect(mut rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn meta(path: &str) -> DocumentMeta {
        DocumentMeta {
            basename: path.to_string(),
            path: path.to_string(),
            mtime: chrono::Utc::now().timestamp_millis(),
            ..DocumentMeta::default()
        }
    }

    #[test]
    fn test_extract_tagged() {
        assert_eq!(
            extract_tagged("sure: <query>foo bar</query>", "query"),
            Some("foo bar".to_string())
        );
        assert_eq!(extract_tagged("no tags here", "query"), None);
        assert_eq!(extract_tagged("<query>  </query>", "query"), None);
        assert_eq!(extract_tagged("<query>unclosed", "query"), None);
    }

    #[tokio::test]
    async fn test_no_search_skips_retrieval_entirely() {
        let (pipeline, _index) = pipeline(MockChat::new(NO_SEARCH_SENTINEL, &["Hello", "!"]));
        let events = collect(pipeline.ask("hi there".into())).await;

        assert!(events
            .iter()
            .all(|e| !matches!(e, PipelineEvent::Sources(_) | PipelineEvent::Progress { .. })));
        assert_eq!(
            events,
            vec![
                PipelineEvent::Token("Hello".into()),
                PipelineEvent::Token("!".into()),
                PipelineEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_sentinel_detected_anywhere_in_reply() {
        let (pipeline, _index) = pipeline(MockChat::new(
            "I think NO_SEARCH_NEEDED applies here.",
            &["ok"],
        ));
        let events = collect(pipeline.ask("hello".into())).await;
        assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Sources(_))));
    }

    #[tokio::test]
    async fn test_empty_retrieval_emits_empty_sources_then_answers() {
        let (pipeline, _index) = pipeline(MockChat::new(
            "<query>unmatched terms</query>",
            &["Nothing", " found"],
        ));
        let events = collect(pipeline.ask("what about X?".into())).await;

        let sources_at = events
            .iter()
            .position(|e| matches!(e, PipelineEvent::Sources(s) if s.is_empty()))
            .expect("empty Sources event");
        assert!(matches!(events.last(), Some(PipelineEvent::Done)));
        assert!(events[sources_at + 1..]
            .iter()
            .any(|e| matches!(e, PipelineEvent::Token(_))));
    }

    #[tokio::test]
    async fn test_full_flow_sources_precede_tokens() {
        let (pipeline, index) = pipeline(MockChat::new(
            "<query>quarterly review</query>",
            &["The review", " is Friday."],
        ));
        index
            .index(
                "notes/review.md::0".into(),
                "quarterly review scheduled".into(),
                meta("notes/review.md"),
            )
            .await
            .unwrap();

        let events = collect(pipeline.ask("when is the quarterly review?".into())).await;

        let sources_at = events
            .iter()
            .position(|e| matches!(e, PipelineEvent::Sources(s) if !s.is_empty()))
            .expect("non-empty Sources event");
        let first_token = events
            .iter()
            .position(|e| matches!(e, PipelineEvent::Token(_)))
            .expect("answer tokens");
        assert!(sources_at < first_token);

        // Progress is cumulative and strictly before Sources
        let mut last = 0;
        for (i, event) in events.iter().enumerate() {
            if let PipelineEvent::Progress { current, total } = event {
                assert!(i < sources_at);
                assert!(*current > last);
                assert!(*current <= *total);
                last = *current;
            }
        }
        assert!(matches!(events.last(), Some(PipelineEvent::Done)));
    }

    #[tokio::test]
    async fn test_grounded_answer_includes_source_context() {
        let chat = MockChat::new("<query>alpha</query>", &["done"]);
        let (pipeline, index) = {
            let index = spawn_default_worker(Duration::from_secs(5));
            let p = RetrievalPipeline::new(
                Arc::new(chat),
                Arc::new(MockEmbedding::new(16)),
                index.clone(),
                SearchConfig {
                    batch_delay_ms: 0,
                    ..SearchConfig::default()
                },
            );
            (p, index)
        };
        index
            .index("a.md::0".into(), "alpha notes body".into(), meta("a.md"))
            .await
            .unwrap();

        let events = collect(pipeline.ask("tell me about alpha".into())).await;
        let docs = events
            .iter()
            .find_map(|e| match e {
                PipelineEvent::Sources(s) => Some(s),
                _ => None,
            })
            .expect("Sources event");
        assert_eq!(docs[0].path, "a.md");

        let messages = build_answer_messages("tell me about alpha", docs);
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.contains("a.md"));
        assert!(messages[1].content.contains("alpha notes body"));
    }
}
