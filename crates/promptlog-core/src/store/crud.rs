use super::UsageStore;
use crate::error::{Error, Result};
use crate::pricing::{calculate_cost, default_costs};
use crate::types::{
    CompletionUpdate, CostConfig, Execution, ExecutionStatus, NewExecution, NewUsage, Usage,
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

impl UsageStore {
    // ── Usages ──────────────────────────────────────────────────

    /// Insert a usage row for one render event. Append-only.
    #[instrument(skip(self, usage))]
    pub async fn insert_usage(&self, usage: NewUsage) -> Result<Usage> {
        if usage.rendered_content.is_empty() {
            return Err(Error::Validation(
                "rendered_content must not be empty".into(),
            ));
        }

        let record = Usage {
            id: Uuid::new_v4().to_string(),
            prompt_id: usage.prompt_id,
            prompt_version: usage.prompt_version,
            environment: usage.environment,
            session_id: usage.session_id,
            user_identifier: usage.user_identifier,
            parameters_used: usage.parameters_used,
            rendered_content: usage.rendered_content,
            rendered_system_message: usage.rendered_system_message,
            metadata: usage.metadata,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO usages
             (id, prompt_id, prompt_version, environment, session_id, user_identifier,
              parameters_used, rendered_content, rendered_system_message, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&record.id)
        .bind(&record.prompt_id)
        .bind(record.prompt_version)
        .bind(&record.environment)
        .bind(&record.session_id)
        .bind(&record.user_identifier)
        .bind(serde_json::to_string(&record.parameters_used)?)
        .bind(&record.rendered_content)
        .bind(&record.rendered_system_message)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Recorded usage {} for prompt {}", record.id, record.prompt_id);
        Ok(record)
    }

    /// Get a usage by ID.
    pub async fn get_usage(&self, id: &str) -> Result<Option<Usage>> {
        let row = sqlx::query(
            "SELECT id, prompt_id, prompt_version, environment, session_id, user_identifier,
                    parameters_used, rendered_content, rendered_system_message, metadata, created_at
             FROM usages WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_usage).transpose()
    }

    /// Delete a usage and its execution. Returns true if a row was deleted.
    ///
    /// Both deletes run in one transaction so a usage can never outlive its
    /// execution or vice versa.
    pub async fn delete_usage(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM llm_executions WHERE usage_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM usages WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub(crate) fn row_to_usage(row: &sqlx::sqlite::SqliteRow) -> Result<Usage> {
        let parameters: String = row.try_get("parameters_used")?;
        let metadata: String = row.try_get("metadata")?;
        let created_str: String = row.try_get("created_at")?;
        Ok(Usage {
            id: row.try_get("id")?,
            prompt_id: row.try_get("prompt_id")?,
            prompt_version: row.try_get("prompt_version")?,
            environment: row.try_get("environment")?,
            session_id: row.try_get("session_id")?,
            user_identifier: row.try_get("user_identifier")?,
            parameters_used: serde_json::from_str(&parameters)?,
            rendered_content: row.try_get("rendered_content")?,
            rendered_system_message: row.try_get("rendered_system_message")?,
            metadata: serde_json::from_str(&metadata)?,
            created_at: parse_timestamp(&created_str),
        })
    }

    // ── Executions ──────────────────────────────────────────────

    /// Create a pending execution for a usage. No cost is computed yet.
    #[instrument(skip(self, execution), fields(usage_id = %execution.usage_id))]
    pub async fn begin_execution(&self, execution: NewExecution) -> Result<Execution> {
        if execution.provider.is_empty() {
            return Err(Error::Validation("provider must not be empty".into()));
        }
        if execution.model.is_empty() {
            return Err(Error::Validation("model must not be empty".into()));
        }

        let now = Utc::now();
        let record = Execution {
            id: Uuid::new_v4().to_string(),
            usage_id: execution.usage_id,
            provider: execution.provider,
            model: execution.model,
            temperature: execution.temperature,
            max_tokens: execution.max_tokens,
            messages_sent: execution.messages,
            status: ExecutionStatus::Pending,
            response_content: None,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            execution_time_ms: None,
            cost_usd: None,
            error_message: None,
            response_metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO llm_executions
             (id, usage_id, provider, model, temperature, max_tokens, messages_sent, status,
              response_metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&record.id)
        .bind(&record.usage_id)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(record.temperature)
        .bind(record.max_tokens)
        .bind(serde_json::to_string(&record.messages_sent)?)
        .bind(record.status.as_str())
        .bind(serde_json::to_string(&record.response_metadata)?)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("Began execution {} ({})", record.id, record.provider);
        Ok(record)
    }

    /// Get an execution by ID.
    pub async fn get_execution(&self, id: &str) -> Result<Option<Execution>> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM llm_executions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_execution).transpose()
    }

    /// Get the execution owned by a usage, if any.
    pub async fn get_execution_for_usage(&self, usage_id: &str) -> Result<Option<Execution>> {
        let row = sqlx::query(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM llm_executions WHERE usage_id = ?1"
        ))
        .bind(usage_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_execution).transpose()
    }

    /// Transition a pending execution to `success` and recompute derived fields.
    ///
    /// `total_tokens` is forced to input + output whenever both counts are
    /// present; `cost_usd` is recomputed whenever this write changes a token
    /// count, priced as of the record's creation date.
    #[instrument(skip(self, update))]
    pub async fn complete_execution(
        &self,
        id: &str,
        update: CompletionUpdate,
    ) -> Result<Execution> {
        let existing = self
            .get_execution(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("execution {id}")))?;
        if existing.status != ExecutionStatus::Pending {
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from: existing.status.to_string(),
            });
        }

        let total_tokens = match (update.input_tokens, update.output_tokens) {
            (Some(input), Some(output)) => Some(input + output),
            _ => update.total_tokens,
        };

        let tokens_changed = update.input_tokens != existing.input_tokens
            || update.output_tokens != existing.output_tokens;
        let cost_usd = if tokens_changed {
            let config = self
                .resolve_pricing(
                    &existing.provider,
                    &existing.model,
                    existing.created_at.date_naive(),
                )
                .await?;
            Some(calculate_cost(
                update.input_tokens,
                update.output_tokens,
                config.as_ref(),
            ))
        } else {
            existing.cost_usd
        };

        let result = sqlx::query(
            "UPDATE llm_executions SET
                status = 'success',
                response_content = ?2,
                input_tokens = ?3,
                output_tokens = ?4,
                total_tokens = ?5,
                execution_time_ms = ?6,
                cost_usd = ?7,
                response_metadata = ?8,
                updated_at = ?9
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .bind(&update.content)
        .bind(update.input_tokens)
        .bind(update.output_tokens)
        .bind(total_tokens)
        .bind(update.execution_time_ms)
        .bind(cost_usd)
        .bind(serde_json::to_string(&update.response_metadata)?)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a race with another finalizer; report the current state.
            let from = self
                .get_execution(id)
                .await?
                .map_or_else(|| "missing".to_string(), |e| e.status.to_string());
            return Err(Error::InvalidTransition {
                id: id.to_string(),
                from,
            });
        }

        debug!("Completed execution {id}");
        self.get_execution(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("execution {id}")))
    }

    /// Transition a pending execution to `error` or `timeout`.
    ///
    /// `error_message` should be in `"Kind: message"` format; it is stored
    /// verbatim for later categorization. The elapsed time is recorded when
    /// the caller measured one; token and cost fields are untouched.
    #[instrument(skip(self, error_message))]
    pub async fn fail_execution(
        &self,
        id: &str,
        status: ExecutionStatus,
        error_message: &str,
        execution_time_ms: Option<f64>,
    ) -> Result<Execution> {
        if !status.is_failed() {
            return Err(Error::Validation(format!(
                "fail_execution requires error or timeout status, got {status}"
            )));
        }

        let result = sqlx::query(
            "UPDATE llm_executions SET
                status = ?2, error_message = ?3, execution_time_ms = ?4, updated_at = ?5
             WHERE id = ?1 AND status = 'pending'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error_message)
        .bind(execution_time_ms)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_execution(id).await? {
                Some(existing) => Err(Error::InvalidTransition {
                    id: id.to_string(),
                    from: existing.status.to_string(),
                }),
                None => Err(Error::NotFound(format!("execution {id}"))),
            };
        }

        debug!("Execution {id} finalized as {status}");
        self.get_execution(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("execution {id}")))
    }

    pub(crate) fn row_to_execution(row: &sqlx::sqlite::SqliteRow) -> Result<Execution> {
        let messages: String = row.try_get("messages_sent")?;
        let metadata: String = row.try_get("response_metadata")?;
        let status_str: String = row.try_get("status")?;
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;
        Ok(Execution {
            id: row.try_get("id")?,
            usage_id: row.try_get("usage_id")?,
            provider: row.try_get("provider")?,
            model: row.try_get("model")?,
            temperature: row.try_get("temperature")?,
            max_tokens: row.try_get("max_tokens")?,
            messages_sent: serde_json::from_str(&messages)?,
            status: status_str.parse().map_err(Error::Internal)?,
            response_content: row.try_get("response_content")?,
            input_tokens: row.try_get("input_tokens")?,
            output_tokens: row.try_get("output_tokens")?,
            total_tokens: row.try_get("total_tokens")?,
            execution_time_ms: row.try_get("execution_time_ms")?,
            cost_usd: row.try_get("cost_usd")?,
            error_message: row.try_get("error_message")?,
            response_metadata: serde_json::from_str(&metadata)?,
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        })
    }

    // ── Cost configs ────────────────────────────────────────────

    /// Insert or update a price row, keyed on (provider, model, effective_from).
    ///
    /// Idempotent: re-running with identical arguments leaves one row;
    /// re-running with different prices updates that row in place.
    #[instrument(skip(self))]
    pub async fn upsert_cost_config(
        &self,
        provider: &str,
        model: &str,
        input_token_cost: f64,
        output_token_cost: f64,
        effective_from: NaiveDate,
        effective_until: Option<NaiveDate>,
    ) -> Result<CostConfig> {
        if provider.is_empty() || model.is_empty() {
            return Err(Error::Validation("provider and model are required".into()));
        }
        if input_token_cost < 0.0 || output_token_cost < 0.0 {
            return Err(Error::Validation("token costs must be >= 0".into()));
        }
        if let Some(until) = effective_until {
            if until < effective_from {
                return Err(Error::Validation(
                    "effective_until must not precede effective_from".into(),
                ));
            }
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO cost_configs
             (id, provider, model, input_token_cost, output_token_cost,
              effective_from, effective_until, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(provider, model, effective_from) DO UPDATE SET
                input_token_cost = excluded.input_token_cost,
                output_token_cost = excluded.output_token_cost,
                updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(provider)
        .bind(model)
        .bind(input_token_cost)
        .bind(output_token_cost)
        .bind(effective_from.to_string())
        .bind(effective_until.map(|d| d.to_string()))
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_cost_config(provider, model, effective_from)
            .await?
            .ok_or_else(|| Error::Internal("upserted cost config missing".into()))
    }

    /// Get a price row by its natural key.
    pub async fn get_cost_config(
        &self,
        provider: &str,
        model: &str,
        effective_from: NaiveDate,
    ) -> Result<Option<CostConfig>> {
        let row = sqlx::query(
            "SELECT id, provider, model, input_token_cost, output_token_cost,
                    effective_from, effective_until, created_at, updated_at
             FROM cost_configs
             WHERE provider = ?1 AND model = ?2 AND effective_from = ?3",
        )
        .bind(provider)
        .bind(model)
        .bind(effective_from.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_cost_config).transpose()
    }

    /// Resolve the price row active for (provider, model) on `as_of`.
    ///
    /// Overlapping ranges tie-break on the latest `effective_from`. `None`
    /// means no pricing is available and callers must treat cost as 0.
    pub async fn resolve_pricing(
        &self,
        provider: &str,
        model: &str,
        as_of: NaiveDate,
    ) -> Result<Option<CostConfig>> {
        let date = as_of.to_string();
        let row = sqlx::query(
            "SELECT id, provider, model, input_token_cost, output_token_cost,
                    effective_from, effective_until, created_at, updated_at
             FROM cost_configs
             WHERE provider = ?1 AND model = ?2
               AND effective_from <= ?3
               AND (effective_until IS NULL OR effective_until >= ?3)
             ORDER BY effective_from DESC
             LIMIT 1",
        )
        .bind(provider)
        .bind(model)
        .bind(&date)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_cost_config).transpose()
    }

    /// Seed the default openai/anthropic price table. Safe to run repeatedly.
    pub async fn seed_default_costs(&self) -> Result<()> {
        for cost in default_costs() {
            self.upsert_cost_config(
                cost.provider,
                cost.model,
                cost.input_token_cost,
                cost.output_token_cost,
                cost.effective_from,
                None,
            )
            .await?;
        }
        Ok(())
    }

    pub(crate) fn row_to_cost_config(row: &sqlx::sqlite::SqliteRow) -> Result<CostConfig> {
        let from_str: String = row.try_get("effective_from")?;
        let until_str: Option<String> = row.try_get("effective_until")?;
        let created_str: String = row.try_get("created_at")?;
        let updated_str: String = row.try_get("updated_at")?;
        Ok(CostConfig {
            id: row.try_get("id")?,
            provider: row.try_get("provider")?,
            model: row.try_get("model")?,
            input_token_cost: row.try_get("input_token_cost")?,
            output_token_cost: row.try_get("output_token_cost")?,
            effective_from: parse_date(&from_str)?,
            effective_until: until_str.as_deref().map(parse_date).transpose()?,
            created_at: parse_timestamp(&created_str),
            updated_at: parse_timestamp(&updated_str),
        })
    }
}

pub(crate) const EXECUTION_COLUMNS: &str =
    "id, usage_id, provider, model, temperature, max_tokens, messages_sent, status,
     response_content, input_tokens, output_tokens, total_tokens, execution_time_ms,
     cost_usd, error_message, response_metadata, created_at, updated_at";

pub(crate) fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::Internal(format!("bad date {s}: {e}")))
}
