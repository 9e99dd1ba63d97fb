//! SQLite backend for conversation turns and human-control flags.
//!
//! Two tables share one pool:
//! - `conversation_turns` append-only; the JSON `payload` column holds the
//!   record and `seq` breaks ties between equal timestamps
//! - `human_control` one row per session, last writer wins

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_core::control::{HumanControlState, HumanControlStore};
use concierge_core::error::{ControlError, MemoryError};
use concierge_core::memory::ConversationStore;
use concierge_core::session::{SessionId, Turn, TurnRole};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::record;

/// A SQLite store implementing both [`ConversationStore`] and
/// [`HumanControlStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a database file.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to :memory: is a separate database
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_turns (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL,
                payload     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("conversation_turns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_session_seq ON conversation_turns(session_id, seq DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("session index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS human_control (
                session_id           TEXT PRIMARY KEY,
                is_human_controlled  INTEGER NOT NULL,
                updated_at           TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("human_control table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Insert a record in whatever shape another writer used.
    pub async fn insert_raw(
        &self,
        session_id: &SessionId,
        payload: &serde_json::Value,
    ) -> Result<(), MemoryError> {
        sqlx::query(
            "INSERT INTO conversation_turns (session_id, payload, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(session_id.as_str())
        .bind(payload.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("INSERT failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(
        &self,
        session_id: &SessionId,
        role: TurnRole,
        content: &str,
    ) -> Result<(), MemoryError> {
        let turn = Turn::new(role, content);
        self.insert_raw(session_id, &record::encode(&turn)).await
    }

    async fn recent(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Turn>, MemoryError> {
        let mut turns = Vec::with_capacity(limit.min(64));
        let mut before = i64::MAX;

        // Page backwards until enough readable turns are collected
        while turns.len() < limit {
            let rows = sqlx::query(
                "SELECT seq, payload FROM conversation_turns \
                 WHERE session_id = ?1 AND seq < ?2 ORDER BY seq DESC LIMIT ?3",
            )
            .bind(session_id.as_str())
            .bind(before)
            .bind((limit - turns.len()) as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("recent turns: {e}")))?;

            if rows.is_empty() {
                break;
            }

            for row in &rows {
                before = row
                    .try_get("seq")
                    .map_err(|e| MemoryError::QueryFailed(format!("seq column: {e}")))?;
                let payload: String = row
                    .try_get("payload")
                    .map_err(|e| MemoryError::QueryFailed(format!("payload column: {e}")))?;
                match serde_json::from_str::<serde_json::Value>(&payload) {
                    Ok(value) => match record::normalize(&value) {
                        Some(turn) => turns.push(turn),
                        None => warn!(session_id = %session_id, "Skipping turn record with unknown shape"),
                    },
                    Err(e) => warn!(session_id = %session_id, error = %e, "Skipping corrupted turn payload"),
                }
            }
        }

        turns.reverse();
        Ok(turns)
    }

    async fn count(&self, session_id: &SessionId) -> Result<usize, MemoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM conversation_turns WHERE session_id = ?1")
            .bind(session_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("count: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| MemoryError::QueryFailed(format!("count column: {e}")))?;
        Ok(n.max(0) as usize)
    }
}

#[async_trait]
impl HumanControlStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<HumanControlState>, ControlError> {
        let row = sqlx::query(
            "SELECT is_human_controlled, updated_at FROM human_control WHERE session_id = ?1",
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ControlError::QueryFailed(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let flag: i64 = row
            .try_get("is_human_controlled")
            .map_err(|e| ControlError::QueryFailed(format!("flag column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| ControlError::QueryFailed(format!("updated_at column: {e}")))?;

        Ok(Some(HumanControlState {
            is_human_controlled: flag != 0,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    async fn set(
        &self,
        session_id: &SessionId,
        human_controlled: bool,
    ) -> Result<HumanControlState, ControlError> {
        let state = HumanControlState {
            is_human_controlled: human_controlled,
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO human_control (session_id, is_human_controlled, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_id) DO UPDATE SET
                is_human_controlled = excluded.is_human_controlled,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id.as_str())
        .bind(i64::from(human_controlled))
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| ControlError::Unavailable(e.to_string()))?;

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn append_and_recent_in_order() {
        let db = test_store().await;
        let sid = SessionId::from("chat:+15550001");
        db.append(&sid, TurnRole::Customer, "one").await.unwrap();
        db.append(&sid, TurnRole::Agent, "two").await.unwrap();
        db.append(&sid, TurnRole::Customer, "three").await.unwrap();

        let turns = db.recent(&sid, 2).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "two");
        assert_eq!(turns[1].content, "three");
        assert_eq!(ConversationStore::name(&db), "sqlite");
        assert_eq!(db.count(&sid).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn foreign_payloads_normalised_and_bad_ones_skipped() {
        let db = test_store().await;
        let sid = SessionId::from("S1");
        db.insert_raw(&sid, &serde_json::json!({"from": "inbound", "message": "legacy hi"}))
            .await
            .unwrap();
        db.insert_raw(&sid, &serde_json::json!({"nothing": "useful"}))
            .await
            .unwrap();
        db.append(&sid, TurnRole::Agent, "hello").await.unwrap();

        let turns = db.recent(&sid, 20).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::Customer);
        assert_eq!(turns[0].content, "legacy hi");
    }

    #[tokio::test]
    async fn window_skips_unreadable_rows_without_shrinking() {
        let db = test_store().await;
        let sid = SessionId::from("S1");
        for i in 0..4 {
            db.append(&sid, TurnRole::Customer, &format!("turn {i}")).await.unwrap();
        }
        db.insert_raw(&sid, &serde_json::json!({"nothing": "useful"}))
            .await
            .unwrap();
        db.insert_raw(&sid, &serde_json::json!({"role": "system", "content": "x"}))
            .await
            .unwrap();

        let turns = db.recent(&sid, 3).await.unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["turn 1", "turn 2", "turn 3"]);
    }

    #[tokio::test]
    async fn human_control_upsert() {
        let db = test_store().await;
        let sid = SessionId::from("S1");
        assert!(db.get(&sid).await.unwrap().is_none());

        db.set(&sid, true).await.unwrap();
        assert!(db.get(&sid).await.unwrap().unwrap().is_human_controlled);

        db.set(&sid, false).await.unwrap();
        let state = db.get(&sid).await.unwrap().unwrap();
        assert!(!state.is_human_controlled);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("c.sqlite").display());
        let sid = SessionId::from("email:jane@example.com");

        {
            let db = SqliteStore::new(&path).await.unwrap();
            db.append(&sid, TurnRole::Customer, "persist me").await.unwrap();
            db.set(&sid, true).await.unwrap();
        }

        let db = SqliteStore::new(&path).await.unwrap();
        assert_eq!(db.recent(&sid, 20).await.unwrap()[0].content, "persist me");
        assert!(db.get(&sid).await.unwrap().unwrap().is_human_controlled);
    }
}
