//! SQLite persistence for the observability tables.
//!
//! One pool serves the `usages`, `llm_executions` and `cost_configs`
//! tables; the embedded migrations run every time a store is opened.

use crate::error::{Error, Result};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

mod crud;
mod migrations;
mod query;


/// Handle to the observability database.
#[derive(Clone)]
pub struct UsageStore {
    pub(crate) pool: SqlitePool,
}

impl UsageStore {
    /// Open the database file, creating it and its parent directory on
    /// first use.
    pub async fn from_path(db_path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Internal(format!("mkdir: {e}")))?;
        }
        let url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        // WAL keeps analytics reads from blocking recorder writes
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        let store = Self::migrated(pool).await?;
        info!("usage store ready at {}", db_path.display());
        Ok(store)
    }

    /// Fresh store on a private in-memory database, for tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::migrated(pool).await?;
        debug!("opened in-memory usage store");
        Ok(store)
    }

    async fn migrated(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }
}
