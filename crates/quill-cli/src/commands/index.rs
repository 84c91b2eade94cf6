use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use quill_engine::{spawn_index_worker, EngineConfig};
use std::sync::Arc;

use crate::vault::index_vault;

pub async fn execute(vault: &str, config: &EngineConfig) -> Result<()> {
    let vault = PathBuf::from(shellexpand::tilde(vault).to_string());

    let handle = spawn_index_worker(
        config.search.tuning.clone(),
        Arc::new(quill_engine::index::tokenizer::NoopSegmenter),
        Duration::from_secs(config.search.worker_timeout_secs),
    );

    let stats = index_vault(&handle, &vault).await?;

    println!(
        "Indexed {} files ({} chunks), {} skipped, {} errors",
        stats.files_indexed, stats.chunks_indexed, stats.files_skipped, stats.errors
    );
    Ok(())
}
