//! File-based conversation store: one JSON-lines file per session.
//!
//! Each line is one turn record. Lines written by other tools may use
//! different field names; they are normalised on read and lines that cannot
//! be parsed are skipped with a warning.
//!
//! Storage location: `~/.concierge/conversations/<session>.jsonl`

use async_trait::async_trait;
use concierge_core::error::MemoryError;
use concierge_core::memory::ConversationStore;
use concierge_core::session::{SessionId, Turn, TurnRole};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::record;

/// A directory of JSONL files, one per session.
///
/// Appends are serialised through a single lock; reads go straight to disk.
pub struct FileConversationStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConversationStore {
    /// Create a store rooted at `dir` (created on first write).
    pub fn new(dir: PathBuf) -> Self {
        debug!(dir = %dir.display(), "File conversation store ready");
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    /// File path for a session. Characters outside `[A-Za-z0-9@._-]` are
    /// percent-encoded so distinct ids never share a file.
    pub fn session_path(&self, session_id: &SessionId) -> PathBuf {
        let mut name = String::with_capacity(session_id.as_str().len() + 6);
        for byte in session_id.as_str().bytes() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'@' | b'.' | b'_' | b'-' => {
                    name.push(byte as char)
                }
                other => name.push_str(&format!("%{other:02X}")),
            }
        }
        name.push_str(".jsonl");
        self.dir.join(name)
    }

    async fn read_turns(path: &Path) -> Result<Vec<Turn>, MemoryError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::QueryFailed(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<serde_json::Value>(line) {
                Ok(value) => {
                    let turn = record::normalize(&value);
                    if turn.is_none() {
                        warn!(path = %path.display(), "Skipping turn record with unknown shape");
                    }
                    turn
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "Skipping corrupted turn record");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(
        &self,
        session_id: &SessionId,
        role: TurnRole,
        content: &str,
    ) -> Result<(), MemoryError> {
        let turn = Turn::new(role, content);
        let mut line = serde_json::to_string(&record::encode(&turn))
            .map_err(|e| MemoryError::Storage(format!("Failed to serialize turn: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            MemoryError::Storage(format!("Failed to create conversation directory: {e}"))
        })?;

        let path = self.session_path(session_id);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open {}: {e}", path.display())))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to append turn: {e}")))?;
        file.flush()
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to flush turn: {e}")))?;

        Ok(())
    }

    async fn recent(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Turn>, MemoryError> {
        let mut turns = Self::read_turns(&self.session_path(session_id)).await?;
        let skip = turns.len().saturating_sub(limit);
        Ok(turns.split_off(skip))
    }

    async fn count(&self, session_id: &SessionId) -> Result<usize, MemoryError> {
        Ok(Self::read_turns(&self.session_path(session_id)).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let sid = SessionId::from("chat:+15551234567");

        {
            let store = FileConversationStore::new(dir.path().to_path_buf());
            store.append(&sid, TurnRole::Customer, "Where is order 42?").await.unwrap();
            store.append(&sid, TurnRole::Agent, "It shipped yesterday.").await.unwrap();
        }

        let store = FileConversationStore::new(dir.path().to_path_buf());
        let turns = store.recent(&sid, 20).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "Where is order 42?");
        assert_eq!(turns[1].role, TurnRole::Agent);
    }

    #[tokio::test]
    async fn missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path().join("nested"));
        assert!(store.recent(&"nobody".into(), 20).await.unwrap().is_empty());
        assert_eq!(store.count(&"nobody".into()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn corrupted_and_foreign_lines_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path().to_path_buf());
        let sid = SessionId::from("email:jane@example.com");

        store.append(&sid, TurnRole::Customer, "first").await.unwrap();
        let path = store.session_path(&sid);
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("this is not json\n");
        content.push_str(r#"{"author":"bot","body":"from a legacy writer","timestamp":"2099-01-01T00:00:00Z"}"#);
        content.push('\n');
        std::fs::write(&path, content).unwrap();

        let turns = store.recent(&sid, 20).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "from a legacy writer");
        assert_eq!(turns[1].role, TurnRole::Agent);
    }

    #[test]
    fn session_paths_do_not_collide() {
        let store = FileConversationStore::new(PathBuf::from("/tmp/x"));
        let a = store.session_path(&"chat:+1".into());
        let b = store.session_path(&"chat_+1".into());
        assert_ne!(a, b);
        assert!(a.to_string_lossy().ends_with("chat%3A%2B1.jsonl"));
    }

    #[tokio::test]
    async fn recent_limits_to_tail() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path().to_path_buf());
        let sid = SessionId::from("S1");
        for i in 0..25 {
            store.append(&sid, TurnRole::Customer, &format!("m{i}")).await.unwrap();
        }
        let turns = store.recent(&sid, 20).await.unwrap();
        assert_eq!(turns.len(), 20);
        assert_eq!(turns[0].content, "m5");
        assert_eq!(store.count(&sid).await.unwrap(), 25);
    }
}
