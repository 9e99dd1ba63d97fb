//! ConversationStore trait: durable, append-only per-session turns.
//!
//! The core only ever appends and loads a bounded recent window. Store
//! implementations own the durable shape; whatever field names that shape
//! uses, `recent` hands back normalised [`Turn`]s.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::session::{SessionId, Turn, TurnRole};

/// The most turns ever loaded into a prompt.
pub const MAX_WINDOW: usize = 20;

/// The core ConversationStore trait.
///
/// Implementations: SQLite, JSONL file, in-memory (for testing).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "file").
    fn name(&self) -> &str;

    /// Append one turn to the end of a session.
    async fn append(
        &self,
        session_id: &SessionId,
        role: TurnRole,
        content: &str,
    ) -> std::result::Result<(), MemoryError>;

    /// Load up to `limit` of the most recent turns, oldest first.
    async fn recent(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> std::result::Result<Vec<Turn>, MemoryError>;

    /// Total turns stored for a session.
    async fn count(&self, session_id: &SessionId) -> std::result::Result<usize, MemoryError>;
}
