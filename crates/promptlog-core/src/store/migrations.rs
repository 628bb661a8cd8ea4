use super::UsageStore;
use crate::error::Result;

impl UsageStore {
    // ── Migrations ──────────────────────────────────────────────

    pub(crate) async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS usages (
                id                      TEXT PRIMARY KEY,
                prompt_id               TEXT NOT NULL,
                prompt_version          INTEGER NOT NULL,
                environment             TEXT,
                session_id              TEXT,
                user_identifier         TEXT,
                parameters_used         TEXT NOT NULL DEFAULT '{}',
                rendered_content        TEXT NOT NULL,
                rendered_system_message TEXT,
                metadata                TEXT NOT NULL DEFAULT '{}',
                created_at              TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_usages_environment ON usages(environment)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_usages_session ON usages(session_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_usages_created ON usages(created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_usages_prompt ON usages(prompt_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS llm_executions (
                id                TEXT PRIMARY KEY,
                usage_id          TEXT NOT NULL UNIQUE REFERENCES usages(id),
                provider          TEXT NOT NULL,
                model             TEXT NOT NULL,
                temperature       REAL,
                max_tokens        INTEGER,
                messages_sent     TEXT NOT NULL DEFAULT '[]',
                status            TEXT NOT NULL,
                response_content  TEXT,
                input_tokens      INTEGER,
                output_tokens     INTEGER,
                total_tokens      INTEGER,
                execution_time_ms REAL,
                cost_usd          REAL,
                error_message     TEXT,
                response_metadata TEXT NOT NULL DEFAULT '{}',
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_executions_provider ON llm_executions(provider)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_executions_model ON llm_executions(model)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_executions_status ON llm_executions(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_executions_created ON llm_executions(created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cost_configs (
                id                TEXT PRIMARY KEY,
                provider          TEXT NOT NULL,
                model             TEXT NOT NULL,
                input_token_cost  REAL NOT NULL,
                output_token_cost REAL NOT NULL,
                effective_from    TEXT NOT NULL,
                effective_until   TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL,
                UNIQUE(provider, model, effective_from)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cost_configs_lookup
             ON cost_configs(provider, model, effective_from DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
