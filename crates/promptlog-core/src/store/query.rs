use super::UsageStore;
use crate::error::Result;
use crate::types::{DateRange, JoinedExecution, Usage};
use sqlx::Row;

impl UsageStore {
    // ── Analytics reads ─────────────────────────────────────────

    /// List usages, optionally scoped to a prompt and/or time window.
    pub async fn list_usages(
        &self,
        prompt_id: Option<&str>,
        range: Option<&DateRange>,
    ) -> Result<Vec<Usage>> {
        let (from, to) = range_bounds(range);
        let rows = sqlx::query(
            "SELECT id, prompt_id, prompt_version, environment, session_id, user_identifier,
                    parameters_used, rendered_content, rendered_system_message, metadata, created_at
             FROM usages
             WHERE (?1 IS NULL OR prompt_id = ?1)
               AND (?2 IS NULL OR created_at >= ?2)
               AND (?3 IS NULL OR created_at <= ?3)
             ORDER BY created_at DESC",
        )
        .bind(prompt_id)
        .bind(&from)
        .bind(&to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_usage).collect()
    }

    /// List executions inner-joined to their usages.
    ///
    /// The time window applies to the *usage* creation time, matching how
    /// usage-level filters scope the rest of the analytics.
    pub async fn list_joined_executions(
        &self,
        prompt_id: Option<&str>,
        range: Option<&DateRange>,
    ) -> Result<Vec<JoinedExecution>> {
        let (from, to) = range_bounds(range);
        let rows = sqlx::query(
            "SELECT e.id, e.usage_id, e.provider, e.model, e.temperature, e.max_tokens,
                    e.messages_sent, e.status, e.response_content, e.input_tokens,
                    e.output_tokens, e.total_tokens, e.execution_time_ms, e.cost_usd,
                    e.error_message, e.response_metadata, e.created_at, e.updated_at,
                    u.prompt_id AS u_prompt_id,
                    u.prompt_version AS u_prompt_version,
                    u.created_at AS u_created_at
             FROM llm_executions e
             JOIN usages u ON u.id = e.usage_id
             WHERE (?1 IS NULL OR u.prompt_id = ?1)
               AND (?2 IS NULL OR u.created_at >= ?2)
               AND (?3 IS NULL OR u.created_at <= ?3)
             ORDER BY e.created_at DESC",
        )
            .bind(prompt_id)
            .bind(&from)
            .bind(&to)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                let usage_created: String = row.try_get("u_created_at")?;
                Ok(JoinedExecution {
                    execution: Self::row_to_execution(row)?,
                    prompt_id: row.try_get("u_prompt_id")?,
                    prompt_version: row.try_get("u_prompt_version")?,
                    usage_created_at: super::crud::parse_timestamp(&usage_created),
                })
            })
            .collect()
    }

    /// Total number of usage rows.
    pub async fn usage_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM usages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Total number of execution rows.
    pub async fn execution_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM llm_executions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    /// Total number of cost config rows.
    pub async fn cost_config_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM cost_configs")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn range_bounds(range: Option<&DateRange>) -> (Option<String>, Option<String>) {
    match range {
        Some(range) => (
            Some(range.from.to_rfc3339()),
            Some(range.to.to_rfc3339()),
        ),
        None => (None, None),
    }
}
