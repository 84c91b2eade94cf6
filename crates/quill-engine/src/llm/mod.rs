pub mod embedding;
pub mod openai;
pub mod provider;
pub mod streaming;
pub mod types;

pub use embedding::OpenAIEmbedding;
pub use openai::OpenAIChatClient;
pub use provider::{ChatProvider, EmbeddingProvider};
pub use streaming::parse_chat_sse;
pub use types::{Message, Role, StreamChunk};
