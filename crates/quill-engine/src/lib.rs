pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod query;
pub mod retrieval;

pub use config::{load_config, EngineConfig, SearchConfig, SearchTuning};
pub use error::EngineError;
pub use index::worker::{spawn_default_worker, spawn_index_worker, IndexHandle};
pub use index::{Candidate, DocumentMeta, IndexedDocument, InvertedIndex};
pub use llm::{ChatProvider, EmbeddingProvider, Message, OpenAIChatClient, OpenAIEmbedding, Role};
pub use query::{parse, ParsedQuery};
pub use retrieval::{PipelineEvent, RankedDocument, RetrievalPipeline};

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
