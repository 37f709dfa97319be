//! SQLite checkpoint store.
//!
//! One table, one row per thread:
//! - `checkpoints(thread_id TEXT PRIMARY KEY, state TEXT, updated_at TEXT)`
//!
//! `state` holds the JSON-serialized `ConversationState`. Writes are upserts,
//! so the row always reflects the latest completed step of the thread.

use async_trait::async_trait;
use docpilot_core::checkpoint::CheckpointStore;
use docpilot_core::error::CheckpointError;
use docpilot_core::message::{ConversationState, ThreadId};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A checkpoint store backed by a SQLite database file.
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database.
    pub async fn new(path: &str) -> Result<Self, CheckpointError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| CheckpointError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Each connection to `:memory:` is its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| CheckpointError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite checkpoint store initialized at {path}");
        Ok(store)
    }

    /// Open the database file at `path`, creating parent directories.
    pub async fn open(path: &std::path::Path) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CheckpointError::Storage(format!("Failed to create checkpoint directory: {e}"))
            })?;
        }
        Self::new(&format!("sqlite://{}", path.display())).await
    }

    async fn run_migrations(&self) -> Result<(), CheckpointError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id  TEXT PRIMARY KEY NOT NULL,
                state      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::MigrationFailed(format!("checkpoints table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>, CheckpointError> {
        let row = sqlx::query("SELECT state FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(format!("SELECT failed: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let json: String = row
            .try_get("state")
            .map_err(|e| CheckpointError::Storage(format!("state column: {e}")))?;

        let state = serde_json::from_str(&json).map_err(|e| CheckpointError::Corrupted {
            thread_id: thread_id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(state))
    }

    async fn put(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<(), CheckpointError> {
        let json = serde_json::to_string(state)
            .map_err(|e| CheckpointError::Storage(format!("State serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (thread_id, state, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(thread_id.as_str())
        .bind(&json)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::Storage(format!("UPSERT failed: {e}")))?;

        debug!(thread_id = %thread_id, messages = state.len(), "Checkpoint written");
        Ok(())
    }

    async fn threads(&self) -> Result<Vec<ThreadId>, CheckpointError> {
        let rows = sqlx::query("SELECT thread_id FROM checkpoints ORDER BY thread_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CheckpointError::Storage(format!("SELECT failed: {e}")))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("thread_id")
                    .map(ThreadId)
                    .map_err(|e| CheckpointError::Storage(format!("thread_id column: {e}")))
            })
            .collect()
    }
}
