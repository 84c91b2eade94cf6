//! Vault ingestion: walk a directory of markdown files, parse each note,
//! and feed its chunks to the index worker.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quill_engine::index::types::DocumentMeta;
use quill_engine::IndexHandle;
use tracing::{info, warn};

use crate::markdown::parse_note;

/// Files larger than this are skipped; they are almost never notes.
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct VaultStats {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub chunks_indexed: usize,
    pub errors: usize,
}

/// Index every markdown file under `vault` into the worker. Per-file
/// failures are logged and counted; they never abort the walk.
pub async fn index_vault(handle: &IndexHandle, vault: &Path) -> Result<VaultStats> {
    let mut stats = VaultStats::default();
    let files = collect_markdown_files(vault)?;
    info!(count = files.len(), vault = %vault.display(), "Indexing vault");

    for path in &files {
        let rel_path = match safe_rel_path(path, vault) {
            Some(r) => r,
            None => {
                warn!(path = %path.display(), "Skipping path outside vault");
                stats.errors += 1;
                continue;
            }
        };

        match index_file(handle, path, &rel_path).await {
            Ok(Some(chunks)) => {
                stats.files_indexed += 1;
                stats.chunks_indexed += chunks;
            }
            Ok(None) => stats.files_skipped += 1,
            Err(e) => {
                warn!(path = %rel_path, error = %e, "Failed to index file");
                stats.errors += 1;
            }
        }
    }

    info!(
        files = stats.files_indexed,
        chunks = stats.chunks_indexed,
        skipped = stats.files_skipped,
        errors = stats.errors,
        "Vault indexing complete"
    );
    Ok(stats)
}

/// Index one file. Returns the chunk count, or None when skipped.
async fn index_file(
    handle: &IndexHandle,
    path: &Path,
    rel_path: &str,
) -> Result<Option<usize>> {
    let metadata = tokio::fs::metadata(path)
        .await
        .context("Failed to read metadata")?;
    if metadata.len() > MAX_FILE_SIZE {
        warn!(path = %path.display(), size = metadata.len(), "Skipping large file");
        return Ok(None);
    }
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let bytes = tokio::fs::read(path).await.context("Failed to read file")?;

    // Binary guard (null byte heuristic)
    let check_len = bytes.len().min(8192);
    if bytes[..check_len].contains(&0) {
        return Ok(None);
    }

    let content = String::from_utf8(bytes).context("File is not valid UTF-8")?;
    let note = parse_note(&content);

    let basename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(rel_path)
        .to_string();

    let meta = DocumentMeta {
        basename,
        aliases: note.aliases.clone(),
        path: rel_path.to_string(),
        h1: note.h1.join(" "),
        h2: note.h2.join(" "),
        h3: note.h3.join(" "),
        tags: note.all_tags(),
        urls: note.urls.clone(),
        links: note.links.clone(),
        mtime,
        frontmatter: note.frontmatter.clone(),
    };

    // Drop stale chunks before re-adding; file edits can shrink chunk count.
    handle.delete(rel_path.to_string()).await?;

    let mut indexed = 0;
    for (i, chunk) in note.chunks.iter().enumerate() {
        handle
            .index(format!("{rel_path}::{i}"), chunk.clone(), meta.clone())
            .await?;
        indexed += 1;
    }
    Ok(Some(indexed))
}

/// Validate and produce a safe relative path, rejecting traversal.
fn safe_rel_path(path: &Path, vault: &Path) -> Option<String> {
    let rel = path.strip_prefix(vault).ok()?;
    let rel_str = rel.to_str()?;
    if rel_str.contains("..") {
        return None;
    }
    Some(rel_str.to_string())
}

/// Collect markdown files recursively, skipping hidden entries.
pub fn collect_markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    collect_recursive(dir, &mut files, &mut visited)?;
    files.sort();
    Ok(files)
}

fn collect_recursive(
    dir: &Path,
    out: &mut Vec<PathBuf>,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    // Symlink loop protection
    if let Ok(canonical) = dir.canonicalize() {
        if !visited.insert(canonical) {
            return Ok(());
        }
    }

    let entries = std::fs::read_dir(dir).context(format!("Failed to read dir: {:?}", dir))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if name.starts_with('.') {
            continue;
        }

        if path.is_dir() {
            collect_recursive(&path, out, visited)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            out.push(path);
        }
    }
    Ok(())
}
