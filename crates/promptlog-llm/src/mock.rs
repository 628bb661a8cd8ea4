//! Mock clients for testing.

use crate::client::{ChatClient, ChatMessage, ChatOptions, ChatReply, StructuredClient};
use crate::error::{Error, Result};
use promptlog_core::types::Message;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A chat client that returns queued replies, or a default one when the
/// queue is empty.
pub struct MockChatClient {
    replies: Arc<Mutex<VecDeque<ChatReply>>>,
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatClient {
    /// Create a mock with an empty reply queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Queue a reply.
    pub fn add_reply(&self, reply: ChatReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Queue a reply object with the given content and token counts.
    pub fn add_message(&self, content: &str, input_tokens: i64, output_tokens: i64) {
        self.add_reply(ChatReply::Message(ChatMessage {
            content: content.to_string(),
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            metadata: json!({}),
        }));
    }
}

#[async_trait::async_trait]
impl ChatClient for MockChatClient {
    async fn ask(&self, _messages: Vec<Message>, _options: &ChatOptions) -> Result<ChatReply> {
        let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
        Ok(replies
            .pop_front()
            .unwrap_or_else(|| ChatReply::Text("mock response".to_string())))
    }
}

/// A chat client that always fails with the given message.
pub struct FailingChatClient {
    message: String,
}

impl FailingChatClient {
    /// Create a client failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl ChatClient for FailingChatClient {
    async fn ask(&self, _messages: Vec<Message>, _options: &ChatOptions) -> Result<ChatReply> {
        Err(Error::Provider(self.message.clone()))
    }
}

/// A chat client that sleeps before answering, for deadline tests.
pub struct SlowChatClient {
    delay: Duration,
}

impl SlowChatClient {
    /// Create a client that sleeps for `delay` before replying.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl ChatClient for SlowChatClient {
    async fn ask(&self, _messages: Vec<Message>, _options: &ChatOptions) -> Result<ChatReply> {
        tokio::time::sleep(self.delay).await;
        Ok(ChatReply::Text("late response".to_string()))
    }
}

/// A structured client that returns queued response bodies.
pub struct MockStructuredClient {
    responses: Arc<Mutex<VecDeque<Value>>>,
    last_params: Arc<Mutex<Option<Value>>>,
}

impl Default for MockStructuredClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStructuredClient {
    /// Create a mock with an empty response queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            last_params: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a raw response body.
    pub fn add_response(&self, response: Value) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// The parameters of the most recent call.
    #[must_use]
    pub fn last_params(&self) -> Option<Value> {
        self.last_params
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl StructuredClient for MockStructuredClient {
    async fn create(&self, params: Value) -> Result<Value> {
        *self.last_params.lock().unwrap_or_else(|e| e.into_inner()) = Some(params);
        let mut responses = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        Ok(responses.pop_front().unwrap_or_else(|| {
            json!({
                "choices": [{"message": {"role": "assistant", "content": "mock response"}}],
                "usage": {"prompt_tokens": 0, "completion_tokens": 0, "total_tokens": 0}
            })
        }))
    }
}
