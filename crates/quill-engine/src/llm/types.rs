use serde::{Deserialize, Serialize};

/// Message role in conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Conversation message (text-only chat contract)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: &str) -> Self {
        Self {
            role: Role::System,
            content: text.to_string(),
        }
    }

    pub fn user(text: &str) -> Self {
        Self {
            role: Role::User,
            content: text.to_string(),
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: text.to_string(),
        }
    }
}

/// Streaming chunk from the chat model
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text delta
    TextDelta(String),
    /// Generation complete
    Done,
}
