use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

use super::provider::ChatProvider;
use super::streaming::{drive_sse_stream, parse_chat_sse};
use super::types::{Message, Role, StreamChunk};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI Chat Completions API client (text-only).
pub struct OpenAIChatClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    /// Custom base URL for OpenAI-compatible APIs (e.g., local LLM)
    base_url: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            base_url: None,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn api_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(OPENAI_API_URL)
    }

    fn build_request_body(&self, messages: &[Message], stream: bool) -> Value {
        let api_messages: Vec<Value> = messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({"role": role, "content": msg.content})
            })
            .collect();

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": api_messages,
            "stream": stream,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAIChatClient {
    async fn chat(&self, messages: &[Message]) -> Result<String> {
        let body = self.build_request_body(messages, false);

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat API error ({}): {}", status, error_body));
        }

        let api_response: ApiResponse = response.json().await?;
        let choice = api_response
            .choices
            .first()
            .ok_or_else(|| anyhow!("No choices in chat response"))?;
        Ok(choice.message.content.clone().unwrap_or_default())
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<mpsc::Receiver<StreamChunk>> {
        let body = self.build_request_body(messages, true);

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Chat API error ({}): {}", status, error_body));
        }

        let (tx, rx) = mpsc::channel(64);
        let byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            drive_sse_stream(byte_stream, parse_chat_sse, tx).await;
        });

        Ok(rx)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI API response structures
#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    content: Option<String>,
}
