//! A rendered prompt ready for execution.

use promptlog_core::recorder::RenderEvent;
use promptlog_core::types::Message;
use serde_json::{json, Value};
use std::collections::HashMap;

/// The output of a prompt render: final text plus the model settings the
/// template carries.
#[derive(Debug, Clone, Default)]
pub struct RenderedPrompt {
    /// Opaque key of the prompt in the templating system
    pub prompt_id: String,
    /// Version number of the template snapshot
    pub prompt_version: i64,
    /// Rendered prompt text
    pub content: String,
    /// Rendered system message, if the template has one
    pub system_message: Option<String>,
    /// Model override from the template; `None` falls back to the
    /// provider default at execution time
    pub model: Option<String>,
    /// Sampling temperature from the template
    pub temperature: Option<f64>,
    /// Max tokens from the template
    pub max_tokens: Option<i64>,
    /// Variable name to substituted value mapping
    pub parameters: HashMap<String, String>,
}

impl RenderedPrompt {
    /// Create a rendered prompt with just the identifying fields.
    #[must_use]
    pub fn new(prompt_id: impl Into<String>, prompt_version: i64, content: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            prompt_version,
            content: content.into(),
            ..Self::default()
        }
    }

    /// Set the system message.
    #[must_use]
    pub fn with_system_message(mut self, system_message: impl Into<String>) -> Self {
        self.system_message = Some(system_message.into());
        self
    }

    /// Set the model override.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: i64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the substituted parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: HashMap<String, String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Build the message list: system message first when present, then the
    /// rendered content as the user turn.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_message {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(self.content.clone()));
        messages
    }

    /// Build a structured request body for the given model, omitting
    /// settings the template does not carry.
    #[must_use]
    pub fn to_structured_params(&self, model: &str) -> Value {
        let mut params = json!({
            "model": model,
            "messages": self.messages(),
        });
        if let Some(map) = params.as_object_mut() {
            if let Some(temperature) = self.temperature {
                map.insert("temperature".into(), json!(temperature));
            }
            if let Some(max_tokens) = self.max_tokens {
                map.insert("max_tokens".into(), json!(max_tokens));
            }
        }
        params
    }

    /// The render event the recorder stores for this prompt.
    #[must_use]
    pub fn to_render_event(&self) -> RenderEvent {
        RenderEvent {
            prompt_id: self.prompt_id.clone(),
            prompt_version: self.prompt_version,
            parameters: self.parameters.clone(),
            rendered_content: self.content.clone(),
            rendered_system_message: self.system_message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptlog_core::types::MessageRole;

    #[test]
    fn messages_put_system_first() {
        let prompt = RenderedPrompt::new("greeting", 1, "Hello World!")
            .with_system_message("Be terse");
        let messages = prompt.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "Hello World!");
    }

    #[test]
    fn messages_without_system() {
        let prompt = RenderedPrompt::new("greeting", 1, "Hello World!");
        let messages = prompt.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[test]
    fn structured_params_omit_absent_settings() {
        let prompt = RenderedPrompt::new("greeting", 1, "Hi").with_temperature(0.7);
        let params = prompt.to_structured_params("gpt-4o");
        assert_eq!(params["model"], "gpt-4o");
        assert_eq!(params["temperature"], 0.7);
        assert!(params.get("max_tokens").is_none());
        assert_eq!(params["messages"][0]["content"], "Hi");
    }
}
