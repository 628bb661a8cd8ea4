//! Core data model: usage events, execution records and cost configs.
//!
//! A *usage* is one render of a prompt template. An *execution* is one
//! attempted provider call tied to a usage (0..1 per usage). Cost configs
//! are time-versioned reference rows resolved by the pricing module.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role in a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl MessageRole {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message sent to a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: MessageRole,
    /// Message content
    pub content: String,
}

impl Message {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Execution record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution created, provider call not yet finished
    Pending,
    /// Provider call completed successfully
    Success,
    /// Provider call failed
    Error,
    /// Provider call exceeded its deadline
    Timeout,
}

impl ExecutionStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }

    /// Check if the status is terminal (success, error, or timeout)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Check if the status is a failure (error or timeout)
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "timeout" => Ok(Self::Timeout),
            _ => Err(format!("unknown execution status: {s}")),
        }
    }
}

/// One render event of a prompt template.
///
/// Append-only: created once at render time, never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    /// Unique identifier
    pub id: String,
    /// Opaque key of the prompt in the external templating system
    pub prompt_id: String,
    /// Version number of the template snapshot that was rendered
    pub prompt_version: i64,
    /// Label of the calling context (e.g. "production", "playground")
    pub environment: Option<String>,
    /// Correlation key for a user session
    pub session_id: Option<String>,
    /// Correlation key for an end user
    pub user_identifier: Option<String>,
    /// Variable name to substituted value mapping
    pub parameters_used: HashMap<String, String>,
    /// The rendered prompt text (always non-empty)
    pub rendered_content: String,
    /// The rendered system message, if the template has one
    pub rendered_system_message: Option<String>,
    /// Open mapping for arbitrary tags (e.g. `{"source": "playground"}`)
    pub metadata: serde_json::Value,
    /// When the render happened
    pub created_at: DateTime<Utc>,
}

/// Input for creating a [`Usage`] row.
#[derive(Debug, Clone, Default)]
pub struct NewUsage {
    /// Opaque prompt key
    pub prompt_id: String,
    /// Template version number
    pub prompt_version: i64,
    /// Calling-context label
    pub environment: Option<String>,
    /// Session correlation key
    pub session_id: Option<String>,
    /// User correlation key
    pub user_identifier: Option<String>,
    /// Substituted parameters
    pub parameters_used: HashMap<String, String>,
    /// Rendered prompt text
    pub rendered_content: String,
    /// Rendered system message
    pub rendered_system_message: Option<String>,
    /// Arbitrary tags
    pub metadata: serde_json::Value,
}

/// One attempted provider call, owned by exactly one [`Usage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier
    pub id: String,
    /// Owning usage record
    pub usage_id: String,
    /// Provider name ("openai", "anthropic", ...)
    pub provider: String,
    /// Model name
    pub model: String,
    /// Sampling temperature sent to the provider
    pub temperature: Option<f64>,
    /// Max tokens sent to the provider
    pub max_tokens: Option<i64>,
    /// Ordered messages sent to the provider
    pub messages_sent: Vec<Message>,
    /// Current status
    pub status: ExecutionStatus,
    /// Response text (set on success)
    pub response_content: Option<String>,
    /// Input token count reported by the provider
    pub input_tokens: Option<i64>,
    /// Output token count reported by the provider
    pub output_tokens: Option<i64>,
    /// Derived: input + output whenever both are known
    pub total_tokens: Option<i64>,
    /// Wall-clock call duration in milliseconds
    pub execution_time_ms: Option<f64>,
    /// Derived cost in USD, 6 decimal places
    pub cost_usd: Option<f64>,
    /// Stored failure diagnostic, `"Kind: message"` format
    pub error_message: Option<String>,
    /// Open mapping of provider response metadata
    pub response_metadata: serde_json::Value,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
}

impl Execution {
    /// Check whether the call succeeded.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Check whether the call failed (error or timeout).
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    /// Check whether the call is still pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ExecutionStatus::Pending
    }

    /// Number of messages that were sent to the provider.
    #[must_use]
    pub fn messages_count(&self) -> usize {
        self.messages_sent.len()
    }
}

/// Input for creating a pending [`Execution`] row.
#[derive(Debug, Clone)]
pub struct NewExecution {
    /// Owning usage record
    pub usage_id: String,
    /// Provider name (required, non-empty)
    pub provider: String,
    /// Model name (required, non-empty)
    pub model: String,
    /// Sampling temperature
    pub temperature: Option<f64>,
    /// Max tokens
    pub max_tokens: Option<i64>,
    /// Messages to be sent
    pub messages: Vec<Message>,
}

/// Success payload for finalizing a pending execution.
#[derive(Debug, Clone, Default)]
pub struct CompletionUpdate {
    /// Response text
    pub content: Option<String>,
    /// Input token count, `None` when the provider did not report it
    pub input_tokens: Option<i64>,
    /// Output token count, `None` when the provider did not report it
    pub output_tokens: Option<i64>,
    /// Total token count; defaults to input + output when absent
    pub total_tokens: Option<i64>,
    /// Wall-clock call duration in milliseconds
    pub execution_time_ms: Option<f64>,
    /// Provider response metadata
    pub response_metadata: serde_json::Value,
}

/// A time-versioned price row for a (provider, model) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    /// Unique identifier
    pub id: String,
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// USD per 1k input tokens
    pub input_token_cost: f64,
    /// USD per 1k output tokens
    pub output_token_cost: f64,
    /// First date (inclusive) the price applies
    pub effective_from: NaiveDate,
    /// Last date (inclusive) the price applies; `None` = open-ended
    pub effective_until: Option<NaiveDate>,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl CostConfig {
    /// Check whether this price row is in effect on `date`.
    #[must_use]
    pub fn is_active(&self, date: NaiveDate) -> bool {
        date >= self.effective_from
            && self.effective_until.map_or(true, |until| date <= until)
    }
}

/// An inclusive time window used by analytics filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    /// Window start (inclusive)
    pub from: DateTime<Utc>,
    /// Window end (inclusive)
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// Window ending now and starting `days` days ago.
    #[must_use]
    pub fn trailing_days(days: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - chrono::Duration::days(days),
            to,
        }
    }

    /// Window ending now and starting `hours` hours ago.
    #[must_use]
    pub fn trailing_hours(hours: i64) -> Self {
        let to = Utc::now();
        Self {
            from: to - chrono::Duration::hours(hours),
            to,
        }
    }

    /// Check whether `at` falls inside the window.
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

/// An execution joined to the usage columns analytics groups by.
#[derive(Debug, Clone)]
pub struct JoinedExecution {
    /// The execution row
    pub execution: Execution,
    /// Prompt key from the owning usage
    pub prompt_id: String,
    /// Template version from the owning usage
    pub prompt_version: i64,
    /// When the owning usage was created
    pub usage_created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_status_roundtrip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Success,
            ExecutionStatus::Error,
            ExecutionStatus::Timeout,
        ] {
            let s = status.to_string();
            let parsed: ExecutionStatus = s.parse().unwrap();
            assert_eq!(status, parsed);
        }
        assert!("running".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn execution_status_terminal() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Error.is_terminal());
        assert!(ExecutionStatus::Timeout.is_terminal());

        assert!(!ExecutionStatus::Success.is_failed());
        assert!(ExecutionStatus::Error.is_failed());
        assert!(ExecutionStatus::Timeout.is_failed());
    }

    #[test]
    fn cost_config_active_window() {
        let config = CostConfig {
            id: "c1".into(),
            provider: "openai".into(),
            model: "gpt-4o".into(),
            input_token_cost: 0.005,
            output_token_cost: 0.015,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            effective_until: Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(config.is_active(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(config.is_active(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert!(!config.is_active(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
        assert!(!config.is_active(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
    }

    #[test]
    fn date_range_contains_bounds() {
        let range = DateRange::trailing_days(7);
        assert!(range.contains(range.from));
        assert!(range.contains(range.to));
        assert!(!range.contains(range.from - chrono::Duration::seconds(1)));
    }

    #[test]
    fn message_constructors() {
        let m = Message::system("be terse");
        assert_eq!(m.role, MessageRole::System);
        assert_eq!(
            serde_json::to_string(&m.role).unwrap(),
            r#""system""#
        );
        assert_eq!(Message::user("hi").role.as_str(), "user");
        assert_eq!(Message::assistant("ok").role.as_str(), "assistant");
    }
}
