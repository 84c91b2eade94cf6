use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use quill_engine::retrieval::passes_filters;
use quill_engine::{parse, spawn_index_worker, EngineConfig};

use crate::vault::index_vault;

pub async fn execute(query: &str, vault: &str, config: &EngineConfig, json: bool) -> Result<()> {
    let vault = PathBuf::from(shellexpand::tilde(vault).to_string());

    let handle = spawn_index_worker(
        config.search.tuning.clone(),
        Arc::new(quill_engine::index::tokenizer::NoopSegmenter),
        Duration::from_secs(config.search.worker_timeout_secs),
    );
    index_vault(&handle, &vault).await?;

    let parsed = parse(query);
    let mut hits = handle
        .search(parsed.clean_text(), Some(config.search.top_k))
        .await?;

    if parsed.has_filters() {
        hits.retain(|hit| passes_filters(&hit.path, &hit.content, &parsed));
    }

    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        if json {
            println!("{}", serde_json::to_string(hit)?);
        } else {
            println!(
                "{:>2}. {:<40} score {:.2}\n    {}",
                rank + 1,
                hit.path,
                hit.keyword_score,
                snippet(&hit.content)
            );
        }
    }
    Ok(())
}

/// First line of the chunk, truncated at a char boundary.
fn snippet(content: &str) -> String {
    let line = content.lines().next().unwrap_or("");
    let mut end = line.len().min(120);
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    if end < line.len() {
        format!("{}…", &line[..end])
    } else {
        line.to_string()
    }
}
