//! Recorder — write-side entry points for render and execution events.
//!
//! The environment label is explicit configuration; nothing here reads
//! ambient process state beyond the host metadata stamped into usage rows.

use crate::error::Result;
use crate::store::UsageStore;
use crate::types::{
    CompletionUpdate, Execution, ExecutionStatus, Message, NewExecution, NewUsage, Usage,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

/// A render event to be logged.
#[derive(Debug, Clone, Default)]
pub struct RenderEvent {
    /// Opaque prompt key from the templating system
    pub prompt_id: String,
    /// Template version number that was rendered
    pub prompt_version: i64,
    /// Variable name to substituted value mapping
    pub parameters: HashMap<String, String>,
    /// Rendered prompt text
    pub rendered_content: String,
    /// Rendered system message, if any
    pub rendered_system_message: Option<String>,
}

/// Optional correlation keys and tags attached to a usage row.
#[derive(Debug, Clone, Default)]
pub struct TrackingOptions {
    /// Session correlation key
    pub session_id: Option<String>,
    /// End-user correlation key
    pub user_identifier: Option<String>,
    /// Caller-supplied tags merged over the base metadata
    pub metadata: Option<serde_json::Value>,
}

/// Write-side service over the usage store.
#[derive(Clone)]
pub struct Recorder {
    store: UsageStore,
    environment: String,
}

impl Recorder {
    /// Create a recorder writing to `store`, labelling rows with `environment`.
    #[must_use]
    pub fn new(store: UsageStore, environment: impl Into<String>) -> Self {
        Self {
            store,
            environment: environment.into(),
        }
    }

    /// The configured environment label.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Access the underlying store.
    #[must_use]
    pub fn store(&self) -> &UsageStore {
        &self.store
    }

    /// Log one render event. Also used for render-only flows that never execute.
    pub async fn log_usage(
        &self,
        event: RenderEvent,
        options: &TrackingOptions,
    ) -> Result<Usage> {
        self.store
            .insert_usage(NewUsage {
                prompt_id: event.prompt_id,
                prompt_version: event.prompt_version,
                environment: Some(self.environment.clone()),
                session_id: options.session_id.clone(),
                user_identifier: options.user_identifier.clone(),
                parameters_used: event.parameters,
                rendered_content: event.rendered_content,
                rendered_system_message: event.rendered_system_message,
                metadata: build_metadata(options.metadata.as_ref()),
            })
            .await
    }

    /// Create a pending execution record for a usage.
    pub async fn log_execution(
        &self,
        usage_id: &str,
        provider: &str,
        model: &str,
        temperature: Option<f64>,
        max_tokens: Option<i64>,
        messages: Vec<Message>,
    ) -> Result<Execution> {
        self.store
            .begin_execution(NewExecution {
                usage_id: usage_id.to_string(),
                provider: provider.to_string(),
                model: model.to_string(),
                temperature,
                max_tokens,
                messages,
            })
            .await
    }

    /// Finalize a pending execution as successful. Cost is recomputed here.
    pub async fn update_execution(
        &self,
        execution_id: &str,
        update: CompletionUpdate,
    ) -> Result<Execution> {
        self.store.complete_execution(execution_id, update).await
    }

    /// Finalize a pending execution as failed.
    ///
    /// The stored diagnostic keeps the `"Kind: message"` shape the error
    /// categorization in analytics relies on.
    pub async fn log_execution_error(
        &self,
        execution_id: &str,
        kind: &str,
        message: &str,
        execution_time_ms: Option<f64>,
    ) -> Result<Execution> {
        self.store
            .fail_execution(
                execution_id,
                ExecutionStatus::Error,
                &format!("{kind}: {message}"),
                execution_time_ms,
            )
            .await
    }

    /// Finalize a pending execution as timed out.
    pub async fn log_execution_timeout(
        &self,
        execution_id: &str,
        message: &str,
        execution_time_ms: Option<f64>,
    ) -> Result<Execution> {
        self.store
            .fail_execution(
                execution_id,
                ExecutionStatus::Timeout,
                &format!("TimeoutError: {message}"),
                execution_time_ms,
            )
            .await
    }
}

/// Base metadata stamped on every usage, merged with caller tags.
fn build_metadata(custom: Option<&serde_json::Value>) -> serde_json::Value {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| {
            warn!("could not determine hostname");
            "unknown".to_string()
        });

    let mut metadata = json!({
        "recorder_version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "hostname": host,
    });

    if let (Some(base), Some(serde_json::Value::Object(extra))) =
        (metadata.as_object_mut(), custom.cloned())
    {
        for (key, value) in extra {
            base.insert(key, value);
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(content: &str) -> RenderEvent {
        RenderEvent {
            prompt_id: "greeting".into(),
            prompt_version: 1,
            parameters: HashMap::from([("name".to_string(), "World".to_string())]),
            rendered_content: content.into(),
            rendered_system_message: None,
        }
    }

    #[tokio::test]
    async fn log_usage_stamps_environment_and_metadata() {
        let store = UsageStore::in_memory().await.unwrap();
        let recorder = Recorder::new(store, "test");

        let options = TrackingOptions {
            session_id: Some("s-1".into()),
            metadata: Some(json!({"source": "adapter"})),
            ..Default::default()
        };
        let usage = recorder.log_usage(event("Hello World!"), &options).await.unwrap();

        assert_eq!(usage.environment.as_deref(), Some("test"));
        assert_eq!(usage.session_id.as_deref(), Some("s-1"));
        assert_eq!(usage.metadata["source"], "adapter");
        assert!(usage.metadata["hostname"].is_string());
        assert!(usage.metadata["timestamp"].is_string());
    }

    #[tokio::test]
    async fn render_only_creates_no_execution() {
        let store = UsageStore::in_memory().await.unwrap();
        let recorder = Recorder::new(store.clone(), "test");

        let usage = recorder
            .log_usage(event("Hello World!"), &TrackingOptions::default())
            .await
            .unwrap();

        assert_eq!(usage.rendered_content, "Hello World!");
        assert_eq!(store.usage_count().await.unwrap(), 1);
        assert_eq!(store.execution_count().await.unwrap(), 0);
        assert!(store.get_execution_for_usage(&usage.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn error_message_keeps_kind_then_message_format() {
        let store = UsageStore::in_memory().await.unwrap();
        let recorder = Recorder::new(store, "test");

        let usage = recorder
            .log_usage(event("Hi"), &TrackingOptions::default())
            .await
            .unwrap();
        let execution = recorder
            .log_execution(&usage.id, "openai", "gpt-4o", None, None, vec![Message::user("Hi")])
            .await
            .unwrap();

        let failed = recorder
            .log_execution_error(&execution.id, "ProviderError", "API Error", Some(88.0))
            .await
            .unwrap();
        assert_eq!(failed.status, ExecutionStatus::Error);
        assert_eq!(failed.error_message.as_deref(), Some("ProviderError: API Error"));
        assert_eq!(failed.execution_time_ms, Some(88.0));
    }
}
