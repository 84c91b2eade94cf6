//! SSE parsing for streamed chat completions.
//! Handles the OpenAI-compatible server-sent event format.

use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;

use super::types::StreamChunk;

/// Max SSE buffer size (1MB) to prevent OOM from malformed streams
const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Drive an SSE byte stream: read chunks, buffer until `\n\n` boundary,
/// decode UTF-8 at event boundaries (not chunk boundaries), parse, and send.
///
/// Uses `Vec<u8>` buffer to avoid corrupting multi-byte UTF-8 chars
/// split across HTTP chunks.
pub async fn drive_sse_stream<S, F>(
    mut byte_stream: S,
    mut parse_event: F,
    tx: tokio::sync::mpsc::Sender<StreamChunk>,
) where
    S: futures::Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
    F: FnMut(&str) -> Vec<StreamChunk>,
{
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk_result) = byte_stream.next().await {
        let bytes = match chunk_result {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("SSE read error: {}", e);
                let _ = tx.send(StreamChunk::Done).await;
                return;
            }
        };

        buffer.extend_from_slice(&bytes);

        // Guard against unbounded buffer growth
        if buffer.len() > MAX_BUFFER_SIZE {
            tracing::error!("SSE buffer exceeded {}B limit, aborting", MAX_BUFFER_SIZE);
            let _ = tx.send(StreamChunk::Done).await;
            return;
        }

        // Process complete SSE events delimited by \n\n
        while let Some(pos) = find_double_newline(&buffer) {
            let event_bytes = buffer[..pos].to_vec();
            buffer = buffer[pos + 2..].to_vec();

            // Safe to decode here: SSE events are complete UTF-8 at boundaries
            let event_block = String::from_utf8_lossy(&event_bytes);

            let data = event_block
                .lines()
                .find_map(|line| line.strip_prefix("data: "))
                .unwrap_or("");

            if data.is_empty() {
                continue;
            }

            for chunk in parse_event(data) {
                let done = chunk == StreamChunk::Done;
                if tx.send(chunk).await.is_err() {
                    return; // receiver dropped
                }
                if done {
                    return;
                }
            }
        }
    }

    // Stream ended without an explicit [DONE]; close out anyway.
    let _ = tx.send(StreamChunk::Done).await;
}

/// Find position of b"\n\n" in buffer
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    delta: Option<ChatMessageDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageDelta {
    content: Option<String>,
}

/// Parse an OpenAI-compatible SSE data line into StreamChunk(s).
/// Returns empty vec for unparseable data — the model side of the wire is
/// untrusted free text.
pub fn parse_chat_sse(data: &str) -> Vec<StreamChunk> {
    let trimmed = data.trim();
    if trimmed == "[DONE]" {
        return vec![StreamChunk::Done];
    }

    let delta: ChatDelta = match serde_json::from_str(trimmed) {
        Ok(d) => d,
        Err(_) => return vec![],
    };

    let mut chunks = Vec::new();

    let Some(choices) = delta.choices else {
        return chunks;
    };

    for choice in &choices {
        if choice.finish_reason.is_some() {
            chunks.push(StreamChunk::Done);
            continue;
        }

        if let Some(ref msg_delta) = choice.delta {
            if let Some(ref content) = msg_delta.content {
                if !content.is_empty() {
                    chunks.push(StreamChunk::TextDelta(content.clone()));
                }
            }
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta() {
        let data = r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#;
        let chunks = parse_chat_sse(data);
        assert_eq!(chunks, vec![StreamChunk::TextDelta("Hi".into())]);
    }

    #[test]
    fn test_done_signal() {
        assert_eq!(parse_chat_sse("[DONE]"), vec![StreamChunk::Done]);
    }

    #[test]
    fn test_finish_reason_stop() {
        let data =
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_chat_sse(data), vec![StreamChunk::Done]);
    }

    #[test]
    fn test_garbage_is_ignored() {
        assert!(parse_chat_sse("not json at all").is_empty());
        assert!(parse_chat_sse("{}").is_empty());
    }

    #[test]
    fn test_empty_content_skipped() {
        let data = r#"{"choices":[{"index":0,"delta":{"content":""}}]}"#;
        assert!(parse_chat_sse(data).is_empty());
    }

    #[test]
    fn test_find_double_newline() {
        assert_eq!(find_double_newline(b"data: x\n\nrest"), Some(7));
        assert_eq!(find_double_newline(b"no boundary"), None);
    }
}
