//! Client abstraction and response normalization.
//!
//! Provider SDKs come in two shapes: chat clients that take a message list
//! and return some flavor of reply object, and structured clients that take
//! a raw request body and return a raw response body. Both are represented
//! here as a closed set; dispatch is always explicit.

use crate::error::Result;
use promptlog_core::types::Message;
use serde_json::{json, Value};
use std::sync::Arc;

/// Call options passed through to a chat client.
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Model to call
    pub model: String,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Max tokens
    pub max_tokens: Option<i64>,
}

/// A chat-shaped provider client.
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a conversation and return the provider's reply.
    async fn ask(&self, messages: Vec<Message>, options: &ChatOptions) -> Result<ChatReply>;
}

/// A structured provider client taking raw request parameters.
#[async_trait::async_trait]
pub trait StructuredClient: Send + Sync {
    /// Send a raw request body and return the raw response body.
    async fn create(&self, params: Value) -> Result<Value>;
}

/// A rich chat reply with token counts.
#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    /// Response text
    pub content: String,
    /// Input token count, if the provider reported one
    pub input_tokens: Option<i64>,
    /// Output token count, if the provider reported one
    pub output_tokens: Option<i64>,
    /// Provider-specific response metadata
    pub metadata: Value,
}

/// The shapes a chat client may answer with.
#[derive(Debug, Clone)]
pub enum ChatReply {
    /// A reply object carrying content and token counts
    Message(ChatMessage),
    /// A bare response string
    Text(String),
    /// An arbitrary JSON payload
    Json(Value),
}

/// Handle to one of the supported client families.
#[derive(Clone)]
pub enum ClientHandle {
    /// A chat-shaped client
    Chat(Arc<dyn ChatClient>),
    /// A structured client
    Structured(Arc<dyn StructuredClient>),
}

impl ClientHandle {
    /// Name of the client family, for logging.
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            Self::Chat(_) => "chat",
            Self::Structured(_) => "structured",
        }
    }
}

/// A provider response reduced to the fields the recorder stores.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    /// Extracted response text
    pub content: String,
    /// Input token count
    pub input_tokens: Option<i64>,
    /// Output token count
    pub output_tokens: Option<i64>,
    /// Total token count as reported by the provider
    pub total_tokens: Option<i64>,
    /// Response metadata with the bulky fields stripped
    pub metadata: Value,
    /// The reply as raw JSON, for callers that want everything
    pub raw: Value,
}

/// Reduce a chat reply to a normalized response.
///
/// Content extraction ladder: reply object content, then bare string, then
/// a JSON `"content"` key, then the stringified payload. Never fails; an
/// unrecognized shape degrades to its string form.
#[must_use]
pub fn normalize_chat_reply(reply: ChatReply) -> NormalizedResponse {
    match reply {
        ChatReply::Message(message) => {
            let total = match (message.input_tokens, message.output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            };
            let raw = json!({
                "content": message.content,
                "input_tokens": message.input_tokens,
                "output_tokens": message.output_tokens,
                "metadata": message.metadata,
            });
            NormalizedResponse {
                content: message.content,
                input_tokens: message.input_tokens,
                output_tokens: message.output_tokens,
                total_tokens: total,
                metadata: message.metadata,
                raw,
            }
        }
        ChatReply::Text(text) => NormalizedResponse {
            content: text.clone(),
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            metadata: json!({}),
            raw: Value::String(text),
        },
        ChatReply::Json(value) => {
            let content = match value.get("content") {
                Some(Value::String(s)) => s.clone(),
                _ => value.to_string(),
            };
            NormalizedResponse {
                content,
                input_tokens: None,
                output_tokens: None,
                total_tokens: None,
                metadata: json!({}),
                raw: value,
            }
        }
    }
}

/// Reduce a structured response body to a normalized response.
///
/// Reads `choices[0].message.content` for the text and the `usage` object
/// for token counts. Everything except `choices` and `usage` is kept as
/// metadata.
#[must_use]
pub fn normalize_structured(raw: Value) -> NormalizedResponse {
    let content = raw
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| raw.to_string());

    let usage = raw.get("usage");
    let token = |key: &str| usage.and_then(|u| u.get(key)).and_then(Value::as_i64);
    let input_tokens = token("prompt_tokens");
    let output_tokens = token("completion_tokens");
    let total_tokens = token("total_tokens");

    let metadata = match &raw {
        Value::Object(map) => {
            let stripped: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(key, _)| key.as_str() != "choices" && key.as_str() != "usage")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(stripped)
        }
        _ => json!({}),
    };

    NormalizedResponse {
        content,
        input_tokens,
        output_tokens,
        total_tokens,
        metadata,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_message_reply_sums_tokens() {
        let reply = ChatReply::Message(ChatMessage {
            content: "Hello!".into(),
            input_tokens: Some(10),
            output_tokens: Some(5),
            metadata: json!({"stop_reason": "end_turn"}),
        });
        let normalized = normalize_chat_reply(reply);
        assert_eq!(normalized.content, "Hello!");
        assert_eq!(normalized.total_tokens, Some(15));
        assert_eq!(normalized.metadata["stop_reason"], "end_turn");
    }

    #[test]
    fn normalize_text_reply_has_no_tokens() {
        let normalized = normalize_chat_reply(ChatReply::Text("plain".into()));
        assert_eq!(normalized.content, "plain");
        assert_eq!(normalized.input_tokens, None);
        assert_eq!(normalized.total_tokens, None);
    }

    #[test]
    fn normalize_json_reply_prefers_content_key() {
        let normalized =
            normalize_chat_reply(ChatReply::Json(json!({"content": "from key", "x": 1})));
        assert_eq!(normalized.content, "from key");

        let normalized = normalize_chat_reply(ChatReply::Json(json!({"answer": 42})));
        assert_eq!(normalized.content, r#"{"answer":42}"#);
    }

    #[test]
    fn normalize_structured_reads_choices_and_usage() {
        let raw = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        });
        let normalized = normalize_structured(raw);
        assert_eq!(normalized.content, "Hi there");
        assert_eq!(normalized.input_tokens, Some(12));
        assert_eq!(normalized.output_tokens, Some(3));
        assert_eq!(normalized.total_tokens, Some(15));
        assert_eq!(normalized.metadata["id"], "chatcmpl-1");
        assert!(normalized.metadata.get("choices").is_none());
        assert!(normalized.metadata.get("usage").is_none());
    }

    #[test]
    fn normalize_structured_degrades_to_string() {
        let normalized = normalize_structured(json!({"error": "odd shape"}));
        assert_eq!(normalized.content, r#"{"error":"odd shape"}"#);
        assert_eq!(normalized.input_tokens, None);
    }
}
