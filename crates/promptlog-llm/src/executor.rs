//! Execution adapter: run a rendered prompt against a provider client and
//! record the full lifecycle.
//!
//! Every call leaves a usage row, whatever happens after it. An execution
//! record exists from the moment the provider call starts and always ends
//! in a terminal state; provider errors are recorded and then re-raised.

use crate::client::{normalize_chat_reply, normalize_structured, ChatOptions, ClientHandle, NormalizedResponse};
use crate::error::{Error, Result};
use crate::rendered::RenderedPrompt;
use promptlog_core::analytics::{categorize_error, ErrorCategory};
use promptlog_core::recorder::{Recorder, TrackingOptions};
use promptlog_core::store::UsageStore;
use promptlog_core::types::CompletionUpdate;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Default model per provider, used when the template carries none.
#[must_use]
pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("gpt-4o"),
        "anthropic" => Some("claude-3-5-sonnet-20241022"),
        _ => None,
    }
}

/// Explicit adapter configuration. Nothing is read from the process
/// environment.
#[derive(Clone)]
pub struct ExecutorConfig {
    /// Provider name ("openai", "anthropic", ...)
    pub provider: String,
    /// Provider API key
    pub api_key: SecretString,
    /// Environment label stamped on every usage row
    pub environment: String,
    /// Tags merged into every usage row's metadata
    pub metadata: Option<Value>,
}

impl ExecutorConfig {
    /// Create a config for `provider`, labelling rows with `environment`.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        api_key: SecretString,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            api_key,
            environment: environment.into(),
            metadata: None,
        }
    }

    /// Attach tags merged into every usage row.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Session correlation key
    pub session_id: Option<String>,
    /// End-user correlation key
    pub user_identifier: Option<String>,
    /// Extra tags for this call's usage row
    pub metadata: Option<Value>,
    /// Hard deadline for the provider call; `None` waits indefinitely
    pub deadline: Option<Duration>,
}

/// The result of a successful execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Extracted response text
    pub content: String,
    /// The provider reply as raw JSON
    pub raw: Value,
    /// Wall-clock call duration in milliseconds
    pub execution_time_ms: f64,
    /// Total token count, when the provider reported one
    pub token_count: Option<i64>,
    /// Computed cost in USD, when token counts were available
    pub cost_usd: Option<f64>,
    /// Provider that was called
    pub provider: String,
    /// Model that was called
    pub model: String,
    /// ID of the usage row recorded for this call
    pub usage_id: String,
    /// ID of the execution record
    pub execution_id: String,
}

/// Runs rendered prompts against one provider client, recording every call.
pub struct ExecutionAdapter {
    recorder: Recorder,
    client: ClientHandle,
    config: ExecutorConfig,
}

impl ExecutionAdapter {
    /// Create an adapter writing to `store` and calling `client`.
    #[must_use]
    pub fn new(store: UsageStore, client: ClientHandle, config: ExecutorConfig) -> Self {
        let recorder = Recorder::new(store, config.environment.clone());
        Self {
            recorder,
            client,
            config,
        }
    }

    /// Access the recorder this adapter writes through.
    #[must_use]
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Execute a rendered prompt.
    ///
    /// Invalid input fails before anything is written. Once the input is
    /// accepted the render is logged unconditionally; once the provider
    /// call starts, the execution record always reaches a terminal state.
    #[instrument(skip(self, prompt, options), fields(prompt_id = %prompt.prompt_id, provider = %self.config.provider))]
    pub async fn execute(
        &self,
        prompt: &RenderedPrompt,
        options: &ExecuteOptions,
    ) -> Result<ExecutionOutcome> {
        self.validate(prompt)?;

        let usage = self
            .recorder
            .log_usage(
                prompt.to_render_event(),
                &TrackingOptions {
                    session_id: options.session_id.clone(),
                    user_identifier: options.user_identifier.clone(),
                    metadata: Some(self.usage_tags(options)),
                },
            )
            .await?;

        let model = match prompt.model.clone().or_else(|| {
            default_model(&self.config.provider).map(str::to_string)
        }) {
            Some(model) => model,
            None => {
                warn!("no model for provider {}", self.config.provider);
                return Err(Error::UnsupportedClient(self.config.provider.clone()));
            }
        };

        let execution = self
            .recorder
            .log_execution(
                &usage.id,
                &self.config.provider,
                &model,
                prompt.temperature,
                prompt.max_tokens,
                prompt.messages(),
            )
            .await?;

        let started = Instant::now();
        let call = self.call_client(prompt, &model);
        let outcome = match options.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // The caller gets the timeout even when the audit
                    // write fails; the record stays pending in that case.
                    let ms = deadline.as_millis() as u64;
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    if let Err(store_err) = self
                        .recorder
                        .log_execution_timeout(
                            &execution.id,
                            &format!("deadline of {ms}ms exceeded"),
                            Some(elapsed_ms),
                        )
                        .await
                    {
                        warn!("could not record timeout for execution {}: {store_err}", execution.id);
                    }
                    return Err(Error::Timeout(ms));
                }
            },
            None => call.await,
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let normalized = match outcome {
            Ok(normalized) => normalized,
            Err(err) => {
                if let Err(store_err) = self
                    .recorder
                    .log_execution_error(&execution.id, err.kind(), &err.detail(), Some(elapsed_ms))
                    .await
                {
                    warn!("could not record failure for execution {}: {store_err}", execution.id);
                }
                return Err(err);
            }
        };

        let completed = self
            .recorder
            .update_execution(
                &execution.id,
                CompletionUpdate {
                    content: Some(normalized.content.clone()),
                    input_tokens: normalized.input_tokens,
                    output_tokens: normalized.output_tokens,
                    total_tokens: normalized.total_tokens,
                    execution_time_ms: Some(elapsed_ms),
                    response_metadata: normalized.metadata,
                },
            )
            .await?;

        info!(
            "Executed prompt {} against {} in {elapsed_ms:.0}ms",
            prompt.prompt_id, model
        );
        Ok(ExecutionOutcome {
            content: normalized.content,
            raw: normalized.raw,
            execution_time_ms: elapsed_ms,
            token_count: completed.total_tokens,
            cost_usd: completed.cost_usd,
            provider: self.config.provider.clone(),
            model,
            usage_id: usage.id,
            execution_id: execution.id,
        })
    }

    fn validate(&self, prompt: &RenderedPrompt) -> Result<()> {
        if self.config.provider.is_empty() {
            return Err(Error::Validation("provider is required".into()));
        }
        if self.config.api_key.expose_secret().is_empty() {
            return Err(Error::Validation("API key is required".into()));
        }
        if prompt.content.is_empty() {
            return Err(Error::Validation("prompt content must not be empty".into()));
        }
        Ok(())
    }

    async fn call_client(
        &self,
        prompt: &RenderedPrompt,
        model: &str,
    ) -> Result<NormalizedResponse> {
        debug!("Dispatching to {} client", self.client.family());
        match &self.client {
            ClientHandle::Chat(client) => {
                let options = ChatOptions {
                    model: model.to_string(),
                    temperature: prompt.temperature,
                    max_tokens: prompt.max_tokens,
                };
                let reply = client.ask(prompt.messages(), &options).await?;
                Ok(normalize_chat_reply(reply))
            }
            ClientHandle::Structured(client) => {
                let raw = client.create(prompt.to_structured_params(model)).await?;
                Ok(normalize_structured(raw))
            }
        }
    }

    fn usage_tags(&self, options: &ExecuteOptions) -> Value {
        let mut tags = json!({"source": "adapter"});
        if let Some(map) = tags.as_object_mut() {
            for extra in [self.config.metadata.as_ref(), options.metadata.as_ref()] {
                if let Some(Value::Object(extra)) = extra {
                    for (key, value) in extra {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        tags
    }
}

/// Map an execution error to a message fit for end users.
#[must_use]
pub fn user_message(error: &Error) -> String {
    let text = format!("{}: {}", error.kind(), error.detail());
    match categorize_error(&text) {
        ErrorCategory::Authentication => "Invalid API key".to_string(),
        ErrorCategory::RateLimit => "Rate limit exceeded. Please try again later.".to_string(),
        ErrorCategory::Network => {
            "Network error. Please check your connection and try again.".to_string()
        }
        ErrorCategory::Timeout => "Request timed out. Please try again.".to_string(),
        _ => format!("An error occurred: {}", error.detail()),
    }
}
