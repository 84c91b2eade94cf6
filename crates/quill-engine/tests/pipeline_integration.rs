//! End-to-end pipeline runs against an in-process index worker and mock
//! providers: triage short-circuit, empty retrieval, and the full
//! search-rerank-answer flow with event ordering.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use quill_engine::index::types::DocumentMeta;
use quill_engine::llm::types::{Message, StreamChunk};
use quill_engine::{
    spawn_default_worker, ChatProvider, EmbeddingProvider, IndexHandle, PipelineEvent,
    RetrievalPipeline, SearchConfig,
};

/// Deterministic hash-based embedder, no network.
struct HashEmbedding {
    dims: usize,
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = Sha256::digest(text.as_bytes());
        Ok((0..self.dims)
            .map(|i| (hash[i % 32] as f32 / 255.0) * 2.0 - 1.0)
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Chat mock with a fixed triage reply and scripted answer tokens.
struct ScriptedChat {
    triage_reply: String,
    answer_tokens: Vec<String>,
}

impl ScriptedChat {
    fn new(triage_reply: &str, answer_tokens: &[&str]) -> Self {
        Self {
            triage_reply: triage_reply.to_string(),
            answer_tokens: answer_tokens.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedChat {
    async fn chat(&self, _messages: &[Message]) -> Result<String> {
        Ok(self.triage_reply.clone())
    }

    async fn chat_stream(&self, _messages: &[Message]) -> Result<mpsc::Receiver<StreamChunk>> {
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
        "scripted"
    }
}

fn build_pipeline(chat: ScriptedChat) -> (RetrievalPipeline, IndexHandle) {
    let index = spawn_default_worker(Duration::from_secs(5));
    let config = SearchConfig {
        batch_delay_ms: 0,
        ..SearchConfig::default()
    };
    let pipeline = RetrievalPipeline::new(
        Arc::new(chat),
        Arc::new(HashEmbedding { dims: 32 }),
        index.clone(),
        config,
    );
    (pipeline, index)
}

async fn collect(mut rx: mpsc::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn meta(path: &str, tags: &[&str]) -> DocumentMeta {
    DocumentMeta {
        basename: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        mtime: chrono::Utc::now().timestamp_millis(),
        ..DocumentMeta::default()
    }
}

#[tokio::test]
async fn greeting_answers_without_touching_the_index() {
    let (pipeline, _index) = build_pipeline(ScriptedChat::new("NO_SEARCH_NEEDED", &["Hi", "!"]));

    let events = collect(pipeline.ask("Hi".into())).await;

    assert_eq!(
        events,
        vec![
            PipelineEvent::Token("Hi".into()),
            PipelineEvent::Token("!".into()),
            PipelineEvent::Done,
        ]
    );
}

#[tokio::test]
async fn no_matches_yields_empty_sources_not_error() {
    let (pipeline, index) = build_pipeline(ScriptedChat::new(
        "<query>\"deadline\" #urgent</query>",
        &["Nothing in your notes."],
    ));
    index
        .index(
            "misc/unrelated.md::0".into(),
            "grocery list and errands".into(),
            meta("misc/unrelated.md", &[]),
        )
        .await
        .unwrap();

    let events = collect(pipeline.ask("any urgent deadlines?".into())).await;

    assert!(events
        .iter()
        .any(|e| matches!(e, PipelineEvent::Sources(s) if s.is_empty())));
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::Error(_))));
    assert!(matches!(events.last(), Some(PipelineEvent::Done)));
}

#[tokio::test]
async fn full_flow_streams_progress_sources_then_answer() {
    let (pipeline, index) = build_pipeline(ScriptedChat::new(
        "<query>project roadmap</query>",
        &["The roadmap", " spans Q3."],
    ));

    for (i, content) in [
        "project roadmap for the engine rewrite",
        "roadmap milestones and owners",
        "unrelated journal entry",
    ]
    .iter()
    .enumerate()
    {
        let path = format!("notes/doc{i}.md");
        index
            .index(format!("{path}::0"), content.to_string(), meta(&path, &[]))
            .await
            .unwrap();
    }

    let events = collect(pipeline.ask("what does the roadmap say?".into())).await;

    let thought_at = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Thought(_)))
        .expect("thought event");
    let sources_at = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Sources(s) if !s.is_empty()))
        .expect("non-empty sources");
    let first_token = events
        .iter()
        .position(|e| matches!(e, PipelineEvent::Token(_)))
        .expect("answer tokens");

    assert!(thought_at < sources_at);
    assert!(sources_at < first_token);
    assert!(matches!(events.last(), Some(PipelineEvent::Done)));

    // Progress is cumulative, stays within total, and ends at total.
    let mut last_current = 0;
    let mut final_progress = None;
    for event in &events[..sources_at] {
        if let PipelineEvent::Progress { current, total } = event {
            assert!(*current > last_current);
            assert!(*current <= *total);
            last_current = *current;
            final_progress = Some((*current, *total));
        }
    }
    let (current, total) = final_progress.expect("progress events");
    assert_eq!(current, total);

    // Ranked documents arrive best-first.
    if let PipelineEvent::Sources(docs) = &events[sources_at] {
        for pair in docs.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }
}

#[tokio::test]
async fn facet_query_filters_sources() {
    let (pipeline, index) = build_pipeline(ScriptedChat::new(
        "<query>meeting -path:archive</query>",
        &["ok"],
    ));
    index
        .index(
            "notes/meeting.md::0".into(),
            "meeting agenda".into(),
            meta("notes/meeting.md", &[]),
        )
        .await
        .unwrap();
    index
        .index(
            "archive/meeting.md::0".into(),
            "meeting agenda".into(),
            meta("archive/meeting.md", &[]),
        )
        .await
        .unwrap();

    let events = collect(pipeline.ask("find my meeting notes".into())).await;

    let docs = events
        .iter()
        .find_map(|e| match e {
            PipelineEvent::Sources(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .expect("sources");
    assert!(docs.iter().all(|d| !d.path.starts_with("archive/")));
    assert!(docs.iter().any(|d| d.path == "notes/meeting.md"));
}
