use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use quill_engine::{
    spawn_index_worker, ChatProvider, EmbeddingProvider, EngineConfig, OpenAIChatClient,
    OpenAIEmbedding, PipelineEvent, RetrievalPipeline,
};

use crate::vault::index_vault;

pub async fn execute(question: &str, vault: &str, config: &EngineConfig) -> Result<()> {
    let vault = PathBuf::from(shellexpand::tilde(vault).to_string());

    let chat = build_chat(config)?;
    let embedder = build_embedder(config)?;

    let handle = spawn_index_worker(
        config.search.tuning.clone(),
        Arc::new(quill_engine::index::tokenizer::NoopSegmenter),
        Duration::from_secs(config.search.worker_timeout_secs),
    );
    index_vault(&handle, &vault).await?;

    let pipeline = RetrievalPipeline::new(chat, embedder, handle, config.search.clone());
    let mut events = pipeline.ask(question.to_string());

    let mut stdout = std::io::stdout();
    let mut reranking = false;
    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::Thought(text) => {
                eprintln!("· {text}");
            }
            PipelineEvent::Progress { current, total } => {
                eprint!("\rReranking {current}/{total}");
                reranking = true;
                if current == total {
                    eprintln!();
                    reranking = false;
                }
            }
            PipelineEvent::Sources(docs) => {
                if reranking {
                    eprintln!();
                    reranking = false;
                }
                if docs.is_empty() {
                    eprintln!("· No matching notes; answering without sources");
                } else {
                    eprintln!("· Sources:");
                    for doc in &docs {
                        eprintln!("    {} (score {:.2})", doc.path, doc.final_score);
                    }
                }
            }
            PipelineEvent::Token(text) => {
                print!("{text}");
                stdout.flush()?;
            }
            PipelineEvent::Done => {
                println!();
                return Ok(());
            }
            PipelineEvent::Error(message) => {
                return Err(anyhow!(message));
            }
        }
    }

    Ok(())
}

/// Build the chat provider, falling back to OPENAI_API_KEY from the
/// environment when the config leaves the key empty.
fn build_chat(config: &EngineConfig) -> Result<Arc<dyn ChatProvider>> {
    let key = resolve_api_key(&config.llm.api_key)?;
    let mut client = OpenAIChatClient::new(&key)?
        .with_model(&config.llm.model)
        .with_generation(config.llm.temperature, config.llm.max_tokens);
    if let Some(url) = &config.llm.base_url {
        client = client.with_base_url(url);
    }
    Ok(Arc::new(client))
}

fn build_embedder(config: &EngineConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let key = resolve_api_key(&config.llm.api_key)?;
    let mut client = OpenAIEmbedding::new(&key)
        .with_model(&config.embedding.model, config.embedding.dimensions);
    if let Some(url) = &config.embedding.base_url {
        client = client.with_base_url(url);
    }
    Ok(Arc::new(client))
}

fn resolve_api_key(configured: &str) -> Result<String> {
    if !configured.is_empty() {
        return Ok(configured.to_string());
    }
    std::env::var("OPENAI_API_KEY").map_err(|_| {
        anyhow!("No API key configured. Set llm.api_key or the OPENAI_API_KEY environment variable.")
    })
}
