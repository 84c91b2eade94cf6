pub mod inverted;
pub mod tokenizer;
pub mod types;
pub mod worker;

pub use inverted::InvertedIndex;
pub use tokenizer::{CjkSegmenter, NoopSegmenter};
pub use types::{Candidate, CandidateSource, DocumentMeta, Field, IndexedDocument};
pub use worker::{
    spawn_default_worker, spawn_index_worker, IndexCommand, IndexHandle, ResponseData,
    ResponseEnvelope, ResponseStatus, DEFAULT_SEARCH_TOP_K,
};
