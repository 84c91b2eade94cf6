use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{Message, StreamChunk};

/// Chat model abstraction: full response or token stream.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate a complete response for a role-tagged message list.
    async fn chat(&self, messages: &[Message]) -> Result<String>;

    /// Stream response tokens. The channel ends with [`StreamChunk::Done`];
    /// dropping the receiver cancels the stream.
    async fn chat_stream(&self, messages: &[Message]) -> Result<mpsc::Receiver<StreamChunk>>;

    /// Provider model name for logging/tracking
    fn model_name(&self) -> &str;
}

/// Abstraction for text → vector embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimensions(&self) -> usize;
}
