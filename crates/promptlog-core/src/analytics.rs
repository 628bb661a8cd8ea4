//! Analytics — read-side aggregation over usages and executions.
//!
//! Every operation is a deterministic function of the stored rows and an
//! optional prompt / date-range filter; nothing here mutates state.

use crate::error::Result;
use crate::store::UsageStore;
use crate::types::{DateRange, JoinedExecution};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Default number of prompts returned by [`Analytics::top_prompts`].
pub const DEFAULT_TOP_PROMPT_LIMIT: usize = 10;

/// Number of recent errors included in [`ErrorAnalysis`].
const RECENT_ERROR_LIMIT: usize = 10;

/// Aggregate statistics for a set of usages and their executions.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    /// Number of render events (with or without execution)
    pub total_uses: i64,
    /// Number of executions (usages inner-joined to executions)
    pub total_executions: i64,
    /// successful / executions × 100, 1 decimal; 0 when there are no executions
    pub success_rate: f64,
    /// Sum of execution costs in USD
    pub total_cost: f64,
    /// Mean total_tokens over executions that reported tokens
    pub average_tokens: Option<i64>,
    /// Mean execution_time_ms over executions that reported timing, 1 decimal
    pub average_latency_ms: Option<f64>,
    /// Usage counts per environment label
    pub by_environment: HashMap<String, i64>,
    /// Execution counts per model
    pub by_model: HashMap<String, i64>,
}

/// Token totals and averages for a set of executions.
#[derive(Debug, Clone, Serialize)]
pub struct TokenUsageStats {
    /// Sum of reported input tokens
    pub total_input_tokens: i64,
    /// Sum of reported output tokens
    pub total_output_tokens: i64,
    /// Mean input tokens over executions that reported them
    pub average_input_tokens: Option<i64>,
    /// Mean output tokens over executions that reported them
    pub average_output_tokens: Option<i64>,
}

/// Per-prompt performance over a window.
#[derive(Debug, Clone, Serialize)]
pub struct PromptPerformance {
    /// Number of executions in the window
    pub total_executions: i64,
    /// Mean latency, 1 decimal
    pub average_latency_ms: Option<f64>,
    /// failed / executions × 100, 1 decimal
    pub error_rate: f64,
    /// successful / executions × 100, 1 decimal
    pub success_rate: f64,
    /// Cost per calendar day, gap-filled with 0 (ISO date keys)
    pub cost_by_day: BTreeMap<String, f64>,
    /// Usage counts per template version
    pub usage_by_version: BTreeMap<i64, i64>,
    /// Execution counts per model
    pub model_distribution: HashMap<String, i64>,
    /// Token totals and averages
    pub token_usage: TokenUsageStats,
}

/// Dimension for [`Analytics::cost_breakdown`].
///
/// `Total` is the catch-all: callers that would otherwise pass an
/// unrecognized dimension get a single aggregate sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostGroupBy {
    /// Group by prompt key
    Prompt,
    /// Group by model
    Model,
    /// Group by provider
    Provider,
    /// Group by calendar day of the execution
    Day,
    /// Single aggregate total
    Total,
}

/// Fixed error-category buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate-limit responses
    RateLimit,
    /// Credential problems
    Authentication,
    /// Network and connection failures
    Network,
    /// Deadline expiries
    Timeout,
    /// Malformed requests
    InvalidRequest,
    /// Everything else
    Other,
}

/// One recent failed execution.
#[derive(Debug, Clone, Serialize)]
pub struct RecentError {
    /// Prompt key of the owning usage
    pub prompt_id: String,
    /// Stored error message
    pub error: Option<String>,
    /// Model that was called
    pub model: String,
    /// When the execution was created
    pub timestamp: DateTime<Utc>,
}

/// Failure breakdown over a window.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorAnalysis {
    /// Number of failed (error or timeout) executions
    pub total_errors: i64,
    /// Counts per fixed category
    pub errors_by_type: BTreeMap<ErrorCategory, i64>,
    /// Failed-execution counts per prompt
    pub errors_by_prompt: HashMap<String, i64>,
    /// The 10 most recent failures
    pub recent_errors: Vec<RecentError>,
}

/// One entry of the [`Analytics::top_prompts`] ranking.
#[derive(Debug, Clone, Serialize)]
pub struct TopPrompt {
    /// Prompt key
    pub prompt_id: String,
    /// Render events in the window
    pub usage_count: i64,
    /// Executions in the window
    pub execution_count: i64,
    /// Cost sum, 2 decimals
    pub total_cost: f64,
    /// Success rate, 1 decimal
    pub success_rate: f64,
}

/// Read-side aggregation engine.
#[derive(Clone)]
pub struct Analytics {
    store: UsageStore,
}

impl Analytics {
    /// Create an analytics engine over `store`.
    #[must_use]
    pub fn new(store: UsageStore) -> Self {
        Self { store }
    }

    /// Aggregate usage statistics, optionally scoped to a prompt and window.
    pub async fn usage_stats(
        &self,
        prompt_id: Option<&str>,
        range: Option<&DateRange>,
    ) -> Result<UsageStats> {
        let usages = self.store.list_usages(prompt_id, range).await?;
        let executions = self.store.list_joined_executions(prompt_id, range).await?;

        let mut by_environment: HashMap<String, i64> = HashMap::new();
        for usage in &usages {
            let key = usage.environment.clone().unwrap_or_else(|| "unknown".into());
            *by_environment.entry(key).or_default() += 1;
        }

        let mut by_model: HashMap<String, i64> = HashMap::new();
        for joined in &executions {
            *by_model.entry(joined.execution.model.clone()).or_default() += 1;
        }

        Ok(UsageStats {
            total_uses: usages.len() as i64,
            total_executions: executions.len() as i64,
            success_rate: success_rate(&executions),
            total_cost: executions
                .iter()
                .map(|j| j.execution.cost_usd.unwrap_or(0.0))
                .sum(),
            average_tokens: average_int(executions.iter().map(|j| j.execution.total_tokens)),
            average_latency_ms: average_rounded(
                executions.iter().map(|j| j.execution.execution_time_ms),
            ),
            by_environment,
            by_model,
        })
    }

    /// Per-prompt performance. Defaults to the trailing 30 days.
    pub async fn prompt_performance(
        &self,
        prompt_id: &str,
        range: Option<DateRange>,
    ) -> Result<PromptPerformance> {
        let range = range.unwrap_or_else(|| DateRange::trailing_days(30));
        let usages = self.store.list_usages(Some(prompt_id), Some(&range)).await?;
        let executions = self
            .store
            .list_joined_executions(Some(prompt_id), Some(&range))
            .await?;

        let mut usage_by_version: BTreeMap<i64, i64> = BTreeMap::new();
        for usage in &usages {
            *usage_by_version.entry(usage.prompt_version).or_default() += 1;
        }

        let mut model_distribution: HashMap<String, i64> = HashMap::new();
        for joined in &executions {
            *model_distribution
                .entry(joined.execution.model.clone())
                .or_default() += 1;
        }

        let input_tokens: Vec<i64> = executions
            .iter()
            .filter_map(|j| j.execution.input_tokens)
            .collect();
        let output_tokens: Vec<i64> = executions
            .iter()
            .filter_map(|j| j.execution.output_tokens)
            .collect();

        Ok(PromptPerformance {
            total_executions: executions.len() as i64,
            average_latency_ms: average_rounded(
                executions.iter().map(|j| j.execution.execution_time_ms),
            ),
            error_rate: error_rate(&executions),
            success_rate: success_rate(&executions),
            cost_by_day: self.cost_by_day(&executions, &range),
            usage_by_version,
            model_distribution,
            token_usage: TokenUsageStats {
                total_input_tokens: input_tokens.iter().sum(),
                total_output_tokens: output_tokens.iter().sum(),
                average_input_tokens: average_int(executions.iter().map(|j| j.execution.input_tokens)),
                average_output_tokens: average_int(
                    executions.iter().map(|j| j.execution.output_tokens),
                ),
            },
        })
    }

    /// Cost sums grouped by a dimension, 2 decimals. Defaults to 7 days.
    pub async fn cost_breakdown(
        &self,
        range: Option<DateRange>,
        group_by: CostGroupBy,
    ) -> Result<BTreeMap<String, f64>> {
        let range = range.unwrap_or_else(|| DateRange::trailing_days(7));
        let executions = self.store.list_joined_executions(None, Some(&range)).await?;

        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for joined in &executions {
            let key = match group_by {
                CostGroupBy::Prompt => joined.prompt_id.clone(),
                CostGroupBy::Model => joined.execution.model.clone(),
                CostGroupBy::Provider => joined.execution.provider.clone(),
                CostGroupBy::Day => joined.execution.created_at.date_naive().to_string(),
                CostGroupBy::Total => "total".to_string(),
            };
            *sums.entry(key).or_default() += joined.execution.cost_usd.unwrap_or(0.0);
        }
        if group_by == CostGroupBy::Total && sums.is_empty() {
            sums.insert("total".to_string(), 0.0);
        }

        Ok(sums.into_iter().map(|(k, v)| (k, round2(v))).collect())
    }

    /// Cost per calendar day over the inclusive range, ISO-date keyed.
    ///
    /// Produces one entry per day, including zero-activity days, so chart
    /// consumers never see silent gaps.
    #[must_use]
    pub fn cost_by_day(
        &self,
        executions: &[JoinedExecution],
        range: &DateRange,
    ) -> BTreeMap<String, f64> {
        let mut daily: BTreeMap<String, f64> = BTreeMap::new();
        let mut day = range.from.date_naive();
        let last = range.to.date_naive();
        while day <= last {
            daily.insert(day.to_string(), 0.0);
            day += Duration::days(1);
        }

        for joined in executions {
            let key = joined.execution.created_at.date_naive().to_string();
            if let Some(sum) = daily.get_mut(&key) {
                *sum += joined.execution.cost_usd.unwrap_or(0.0);
            }
        }

        daily.into_iter().map(|(k, v)| (k, round2(v))).collect()
    }

    /// Failure breakdown. Defaults to the trailing 24 hours.
    pub async fn error_analysis(&self, range: Option<DateRange>) -> Result<ErrorAnalysis> {
        let range = range.unwrap_or_else(|| DateRange::trailing_hours(24));
        let executions = self.store.list_joined_executions(None, Some(&range)).await?;
        // Query returns newest first, so the head of this list is already
        // the most recent failure.
        let failed: Vec<&JoinedExecution> = executions
            .iter()
            .filter(|j| j.execution.status.is_failed())
            .collect();

        let mut errors_by_type: BTreeMap<ErrorCategory, i64> = BTreeMap::new();
        for category in [
            ErrorCategory::RateLimit,
            ErrorCategory::Authentication,
            ErrorCategory::Network,
            ErrorCategory::Timeout,
            ErrorCategory::InvalidRequest,
            ErrorCategory::Other,
        ] {
            errors_by_type.insert(category, 0);
        }
        let mut errors_by_prompt: HashMap<String, i64> = HashMap::new();
        for joined in &failed {
            let message = joined.execution.error_message.as_deref().unwrap_or("");
            *errors_by_type.entry(categorize_error(message)).or_default() += 1;
            *errors_by_prompt.entry(joined.prompt_id.clone()).or_default() += 1;
        }

        let recent_errors = failed
            .iter()
            .take(RECENT_ERROR_LIMIT)
            .map(|joined| RecentError {
                prompt_id: joined.prompt_id.clone(),
                error: joined.execution.error_message.clone(),
                model: joined.execution.model.clone(),
                timestamp: joined.execution.created_at,
            })
            .collect();

        Ok(ErrorAnalysis {
            total_errors: failed.len() as i64,
            errors_by_type,
            errors_by_prompt,
            recent_errors,
        })
    }

    /// Prompts ranked by usage count, descending. Defaults: 7 days, 10 rows.
    pub async fn top_prompts(
        &self,
        range: Option<DateRange>,
        limit: Option<usize>,
    ) -> Result<Vec<TopPrompt>> {
        let range = range.unwrap_or_else(|| DateRange::trailing_days(7));
        let limit = limit.unwrap_or(DEFAULT_TOP_PROMPT_LIMIT);
        let usages = self.store.list_usages(None, Some(&range)).await?;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for usage in &usages {
            *counts.entry(usage.prompt_id.clone()).or_default() += 1;
        }
        let mut ranked: Vec<(String, i64)> = counts.into_iter().collect();
        // Stable ordering for equal counts
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        let mut top = Vec::with_capacity(ranked.len());
        for (prompt_id, usage_count) in ranked {
            let stats = self.usage_stats(Some(&prompt_id), Some(&range)).await?;
            top.push(TopPrompt {
                prompt_id,
                usage_count,
                execution_count: stats.total_executions,
                total_cost: round2(stats.total_cost),
                success_rate: stats.success_rate,
            });
        }
        Ok(top)
    }
}

/// Bucket a stored error message into one of the fixed categories.
///
/// Case-insensitive substring / pattern matching, first match wins.
#[must_use]
pub fn categorize_error(message: &str) -> ErrorCategory {
    static INVALID_KEY: OnceLock<Regex> = OnceLock::new();
    static INVALID_REQUEST: OnceLock<Regex> = OnceLock::new();
    let invalid_key = INVALID_KEY.get_or_init(|| Regex::new(r"invalid.*key").unwrap());
    let invalid_request = INVALID_REQUEST.get_or_init(|| Regex::new(r"invalid.*request").unwrap());

    let message = message.to_lowercase();
    if message.contains("rate limit") {
        ErrorCategory::RateLimit
    } else if message.contains("unauthorized")
        || message.contains("authentication")
        || invalid_key.is_match(&message)
    {
        ErrorCategory::Authentication
    } else if message.contains("network") || message.contains("connection") {
        ErrorCategory::Network
    } else if message.contains("timeout") {
        ErrorCategory::Timeout
    } else if message.contains("bad request") || invalid_request.is_match(&message) {
        ErrorCategory::InvalidRequest
    } else {
        ErrorCategory::Other
    }
}

impl PartialOrd for ErrorCategory {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ErrorCategory {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

fn success_rate(executions: &[JoinedExecution]) -> f64 {
    rate(executions, |j| j.execution.is_successful())
}

fn error_rate(executions: &[JoinedExecution]) -> f64 {
    rate(executions, |j| j.execution.is_failed())
}

fn rate(executions: &[JoinedExecution], pred: impl Fn(&JoinedExecution) -> bool) -> f64 {
    let total = executions.len();
    if total == 0 {
        return 0.0;
    }
    let matching = executions.iter().filter(|j| pred(j)).count();
    round1(matching as f64 / total as f64 * 100.0)
}

fn average_int(values: impl Iterator<Item = Option<i64>>) -> Option<i64> {
    let present: Vec<i64> = values.flatten().collect();
    if present.is_empty() {
        return None;
    }
    Some((present.iter().sum::<i64>() as f64 / present.len() as f64) as i64)
}

fn average_rounded(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        return None;
    }
    Some(round1(present.iter().sum::<f64>() / present.len() as f64))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{Recorder, RenderEvent, TrackingOptions};
    use crate::types::{CompletionUpdate, Execution, ExecutionStatus, Message};
    use chrono::{NaiveDate, TimeZone};
    use std::collections::HashMap as Map;

    async fn test_env() -> (UsageStore, Recorder, Analytics) {
        let store = UsageStore::in_memory().await.unwrap();
        store.seed_default_costs().await.unwrap();
        let recorder = Recorder::new(store.clone(), "test");
        let analytics = Analytics::new(store.clone());
        (store, recorder, analytics)
    }

    fn render(prompt_id: &str) -> RenderEvent {
        RenderEvent {
            prompt_id: prompt_id.into(),
            prompt_version: 1,
            parameters: Map::new(),
            rendered_content: "Hello World!".into(),
            rendered_system_message: None,
        }
    }

    async fn log_usage(recorder: &Recorder, prompt_id: &str) -> String {
        recorder
            .log_usage(render(prompt_id), &TrackingOptions::default())
            .await
            .unwrap()
            .id
    }

    async fn log_success(recorder: &Recorder, prompt_id: &str, tokens: (i64, i64)) {
        let usage_id = log_usage(recorder, prompt_id).await;
        let execution = recorder
            .log_execution(&usage_id, "openai", "gpt-4o", None, None, vec![Message::user("Hi")])
            .await
            .unwrap();
        recorder
            .update_execution(
                &execution.id,
                CompletionUpdate {
                    content: Some("Hello there!".into()),
                    input_tokens: Some(tokens.0),
                    output_tokens: Some(tokens.1),
                    execution_time_ms: Some(120.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    async fn log_failure(recorder: &Recorder, prompt_id: &str, message: &str) {
        let usage_id = log_usage(recorder, prompt_id).await;
        let execution = recorder
            .log_execution(&usage_id, "openai", "gpt-4o", None, None, vec![Message::user("Hi")])
            .await
            .unwrap();
        recorder
            .log_execution_error(&execution.id, "ProviderError", message, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn usage_stats_success_rate_counts_executions_not_usages() {
        let (_store, recorder, analytics) = test_env().await;

        // 3 render-only usages, 1 successful and 1 failed execution
        for _ in 0..3 {
            log_usage(&recorder, "greeting").await;
        }
        log_success(&recorder, "greeting", (10, 5)).await;
        log_failure(&recorder, "greeting", "API Error").await;

        let stats = analytics.usage_stats(None, None).await.unwrap();
        assert_eq!(stats.total_uses, 5);
        assert_eq!(stats.total_executions, 2);
        assert_eq!(stats.success_rate, 50.0);
        assert_eq!(stats.by_environment.get("test"), Some(&5));
        assert_eq!(stats.by_model.get("gpt-4o"), Some(&2));
        assert!(stats.total_cost > 0.0);
    }

    #[tokio::test]
    async fn usage_stats_empty_store_has_zero_rate() {
        let (_store, _recorder, analytics) = test_env().await;
        let stats = analytics.usage_stats(None, None).await.unwrap();
        assert_eq!(stats.total_uses, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_tokens, None);
        assert_eq!(stats.average_latency_ms, None);
    }

    #[tokio::test]
    async fn usage_stats_scopes_to_prompt() {
        let (_store, recorder, analytics) = test_env().await;
        log_success(&recorder, "a", (10, 5)).await;
        log_success(&recorder, "b", (20, 10)).await;
        log_usage(&recorder, "b").await;

        let stats = analytics.usage_stats(Some("b"), None).await.unwrap();
        assert_eq!(stats.total_uses, 2);
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.success_rate, 100.0);
    }

    fn joined(day: NaiveDate, cost: f64) -> JoinedExecution {
        let at = Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap());
        JoinedExecution {
            execution: Execution {
                id: "e".into(),
                usage_id: "u".into(),
                provider: "openai".into(),
                model: "gpt-4o".into(),
                temperature: None,
                max_tokens: None,
                messages_sent: vec![],
                status: ExecutionStatus::Success,
                response_content: None,
                input_tokens: None,
                output_tokens: None,
                total_tokens: None,
                execution_time_ms: None,
                cost_usd: Some(cost),
                error_message: None,
                response_metadata: serde_json::json!({}),
                created_at: at,
                updated_at: at,
            },
            prompt_id: "p".into(),
            prompt_version: 1,
            usage_created_at: at,
        }
    }

    #[tokio::test]
    async fn cost_by_day_gap_fills_zero_days() {
        let (store, _recorder, _analytics) = test_env().await;
        let analytics = Analytics::new(store);

        let day1 = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let day3 = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let range = DateRange {
            from: Utc.from_utc_datetime(&day1.and_hms_opt(0, 0, 0).unwrap()),
            to: Utc.from_utc_datetime(&day3.and_hms_opt(23, 59, 59).unwrap()),
        };
        let executions = vec![joined(day1, 1.25), joined(day3, 0.75)];

        let by_day = analytics.cost_by_day(&executions, &range);
        assert_eq!(by_day.len(), 3);
        assert_eq!(by_day.get("2025-03-01"), Some(&1.25));
        assert_eq!(by_day.get("2025-03-02"), Some(&0.0));
        assert_eq!(by_day.get("2025-03-03"), Some(&0.75));
    }

    #[test]
    fn categorize_error_buckets() {
        assert_eq!(categorize_error("Rate limit exceeded"), ErrorCategory::RateLimit);
        assert_eq!(categorize_error("Unauthorized access"), ErrorCategory::Authentication);
        assert_eq!(
            categorize_error("ProviderError: Invalid API key provided"),
            ErrorCategory::Authentication
        );
        assert_eq!(
            categorize_error("Network connection failed"),
            ErrorCategory::Network
        );
        assert_eq!(
            categorize_error("TimeoutError: deadline of 500ms exceeded"),
            ErrorCategory::Timeout
        );
        assert_eq!(categorize_error("400 Bad Request"), ErrorCategory::InvalidRequest);
        assert_eq!(categorize_error("something strange"), ErrorCategory::Other);
    }

    #[tokio::test]
    async fn error_analysis_counts_and_recent() {
        let (_store, recorder, analytics) = test_env().await;
        log_failure(&recorder, "greeting", "Rate limit exceeded").await;
        log_failure(&recorder, "greeting", "Unauthorized access").await;
        log_failure(&recorder, "summary", "weird failure").await;
        log_success(&recorder, "summary", (10, 5)).await;

        let analysis = analytics.error_analysis(None).await.unwrap();
        assert_eq!(analysis.total_errors, 3);
        assert_eq!(analysis.errors_by_type[&ErrorCategory::RateLimit], 1);
        assert_eq!(analysis.errors_by_type[&ErrorCategory::Authentication], 1);
        assert_eq!(analysis.errors_by_type[&ErrorCategory::Other], 1);
        assert_eq!(analysis.errors_by_type[&ErrorCategory::Network], 0);
        assert_eq!(analysis.errors_by_prompt.get("greeting"), Some(&2));
        assert_eq!(analysis.recent_errors.len(), 3);
    }

    #[tokio::test]
    async fn cost_breakdown_groups_and_falls_back_to_total() {
        let (_store, recorder, analytics) = test_env().await;
        log_success(&recorder, "a", (1000, 1000)).await;
        log_success(&recorder, "b", (2000, 2000)).await;

        let by_prompt = analytics
            .cost_breakdown(None, CostGroupBy::Prompt)
            .await
            .unwrap();
        assert_eq!(by_prompt.len(), 2);
        assert!(by_prompt.contains_key("a") && by_prompt.contains_key("b"));

        let by_provider = analytics
            .cost_breakdown(None, CostGroupBy::Provider)
            .await
            .unwrap();
        assert_eq!(by_provider.len(), 1);
        assert!(by_provider.contains_key("openai"));

        let total = analytics
            .cost_breakdown(None, CostGroupBy::Total)
            .await
            .unwrap();
        assert_eq!(total.len(), 1);
        assert!(total.contains_key("total"));

        let by_day = analytics.cost_breakdown(None, CostGroupBy::Day).await.unwrap();
        assert_eq!(by_day.len(), 1); // everything logged today
    }

    #[tokio::test]
    async fn top_prompts_ranks_by_usage_count() {
        let (_store, recorder, analytics) = test_env().await;
        for _ in 0..3 {
            log_usage(&recorder, "popular").await;
        }
        log_success(&recorder, "popular", (10, 5)).await;
        log_usage(&recorder, "rare").await;

        let top = analytics.top_prompts(None, None).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].prompt_id, "popular");
        assert_eq!(top[0].usage_count, 4);
        assert_eq!(top[0].execution_count, 1);
        assert_eq!(top[0].success_rate, 100.0);
        assert_eq!(top[1].prompt_id, "rare");

        let limited = analytics.top_prompts(None, Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn prompt_performance_reports_tokens_and_rates() {
        let (_store, recorder, analytics) = test_env().await;
        log_success(&recorder, "greeting", (10, 5)).await;
        log_success(&recorder, "greeting", (20, 15)).await;
        log_failure(&recorder, "greeting", "API Error").await;

        let perf = analytics
            .prompt_performance("greeting", None)
            .await
            .unwrap();
        assert_eq!(perf.total_executions, 3);
        assert_eq!(perf.success_rate, 66.7);
        assert_eq!(perf.error_rate, 33.3);
        assert_eq!(perf.token_usage.total_input_tokens, 30);
        assert_eq!(perf.token_usage.total_output_tokens, 20);
        assert_eq!(perf.token_usage.average_input_tokens, Some(15));
        assert_eq!(perf.usage_by_version.get(&1), Some(&3));
        assert_eq!(perf.model_distribution.get("gpt-4o"), Some(&3));
        // 30 days of gap-filled entries (31 calendar days inclusive)
        assert!(perf.cost_by_day.len() >= 30);
        assert!(perf.cost_by_day.values().any(|v| *v > 0.0));
    }
}
