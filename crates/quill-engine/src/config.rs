use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::index::types::Field;

/// Engine configuration. Every field has a compiled-in default so a config
/// file is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// API key; falls back to OPENAI_API_KEY when empty.
    #[serde(default)]
    pub api_key: String,

    /// Custom base URL for OpenAI-compatible APIs (e.g., local LLM)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default result count for worker `search` commands.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Lexical candidates fetched ahead of reranking.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Scored chunks kept before document grouping.
    #[serde(default = "default_chunk_cutoff")]
    pub chunk_cutoff: usize,

    /// Ranked documents returned to the caller.
    #[serde(default = "default_doc_cutoff")]
    pub doc_cutoff: usize,

    /// Lexical candidates returned when reranking fails outright.
    #[serde(default = "default_fallback_limit")]
    pub fallback_limit: usize,

    /// Embedding calls per batch; members of one batch run concurrently.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between embedding batches, in milliseconds.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Timeout for one worker round-trip, in seconds.
    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,

    #[serde(default)]
    pub tuning: SearchTuning,
}

/// Relevance tunables: field boosts and fuzzy/prefix thresholds. These are
/// configuration, not invariants — the defaults are the shipped ranking
/// behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTuning {
    #[serde(default = "default_boost_basename")]
    pub boost_basename: f32,
    #[serde(default = "default_boost_aliases")]
    pub boost_aliases: f32,
    #[serde(default = "default_boost_tags")]
    pub boost_tags: f32,
    #[serde(default = "default_boost_h1")]
    pub boost_h1: f32,
    #[serde(default = "default_boost_h2")]
    pub boost_h2: f32,
    #[serde(default = "default_boost_links")]
    pub boost_links: f32,
    #[serde(default = "default_boost_h3")]
    pub boost_h3: f32,
    #[serde(default = "default_boost_urls")]
    pub boost_urls: f32,
    #[serde(default = "default_boost_path")]
    pub boost_path: f32,
    #[serde(default = "default_boost_content")]
    pub boost_content: f32,

    /// Edit-distance tolerance for terms of length 4-5 (proportional).
    #[serde(default = "default_fuzzy_medium")]
    pub fuzzy_medium: f32,
    /// Edit-distance tolerance for terms of length >= 6 (proportional).
    #[serde(default = "default_fuzzy_long")]
    pub fuzzy_long: f32,
    /// Minimum query-term length for prefix matching.
    #[serde(default = "default_min_prefix_len")]
    pub min_prefix_len: usize,
}

impl SearchTuning {
    pub fn boost(&self, field: Field) -> f32 {
        match field {
            Field::Basename => self.boost_basename,
            Field::Aliases => self.boost_aliases,
            Field::Tags => self.boost_tags,
            Field::H1 => self.boost_h1,
            Field::H2 => self.boost_h2,
            Field::Links => self.boost_links,
            Field::H3 => self.boost_h3,
            Field::Urls => self.boost_urls,
            Field::Path => self.boost_path,
            Field::Content => self.boost_content,
        }
    }

    /// Proportional fuzzy tolerance for a query term: short terms require
    /// exact match, medium terms get 0.1, long terms 0.2.
    pub fn fuzzy_tolerance(&self, term_len: usize) -> f32 {
        match term_len {
            0..=3 => 0.0,
            4..=5 => self.fuzzy_medium,
            _ => self.fuzzy_long,
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_top_k() -> usize {
    30
}

fn default_candidate_pool() -> usize {
    100
}

fn default_chunk_cutoff() -> usize {
    50
}

fn default_doc_cutoff() -> usize {
    20
}

fn default_fallback_limit() -> usize {
    12
}

fn default_batch_size() -> usize {
    1
}

fn default_batch_delay_ms() -> u64 {
    50
}

fn default_worker_timeout_secs() -> u64 {
    30
}

fn default_boost_basename() -> f32 {
    4.0
}

fn default_boost_aliases() -> f32 {
    3.5
}

fn default_boost_tags() -> f32 {
    3.0
}

fn default_boost_h1() -> f32 {
    2.5
}

fn default_boost_h2() -> f32 {
    2.0
}

fn default_boost_links() -> f32 {
    1.8
}

fn default_boost_h3() -> f32 {
    1.5
}

fn default_boost_urls() -> f32 {
    1.3
}

fn default_boost_path() -> f32 {
    1.2
}

fn default_boost_content() -> f32 {
    1.0
}

fn default_fuzzy_medium() -> f32 {
    0.1
}

fn default_fuzzy_long() -> f32 {
    0.2
}

fn default_min_prefix_len() -> usize {
    2
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            api_key: String::new(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            base_url: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_pool: default_candidate_pool(),
            chunk_cutoff: default_chunk_cutoff(),
            doc_cutoff: default_doc_cutoff(),
            fallback_limit: default_fallback_limit(),
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            worker_timeout_secs: default_worker_timeout_secs(),
            tuning: SearchTuning::default(),
        }
    }
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            boost_basename: default_boost_basename(),
            boost_aliases: default_boost_aliases(),
            boost_tags: default_boost_tags(),
            boost_h1: default_boost_h1(),
            boost_h2: default_boost_h2(),
            boost_links: default_boost_links(),
            boost_h3: default_boost_h3(),
            boost_urls: default_boost_urls(),
            boost_path: default_boost_path(),
            boost_content: default_boost_content(),
            fuzzy_medium: default_fuzzy_medium(),
            fuzzy_long: default_fuzzy_long(),
            min_prefix_len: default_min_prefix_len(),
        }
    }
}

/// Load config from file or use defaults
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read config file: {:?}", path))?;
            let config: EngineConfig =
                toml::from_str(&content).context("Failed to parse TOML config")?;
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}
