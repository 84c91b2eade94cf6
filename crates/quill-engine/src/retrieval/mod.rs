pub mod filter;
pub mod pipeline;
pub mod reranker;

pub use filter::passes_filters;
pub use pipeline::{PipelineEvent, RetrievalPipeline};
pub use reranker::{RankedDocument, RerankOptions, Reranker, ScoredChunk};
