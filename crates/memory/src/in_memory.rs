//! In-memory stores: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use concierge_core::control::{HumanControlState, HumanControlStore};
use concierge_core::error::{ControlError, MemoryError};
use concierge_core::memory::ConversationStore;
use concierge_core::session::{SessionId, Turn, TurnRole};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::record;

/// Conversation store that keeps raw records in a map of Vecs.
/// Records go through the same normaliser as the durable backends.
pub struct InMemoryConversationStore {
    sessions: Arc<RwLock<HashMap<SessionId, Vec<Value>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record exactly as some other writer might have stored it.
    pub async fn insert_raw(&self, session_id: &SessionId, record: Value) {
        self.sessions
            .write()
            .await
            .entry(session_id.clone())
            .or_default()
            .push(record);
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(
        &self,
        session_id: &SessionId,
        role: TurnRole,
        content: &str,
    ) -> Result<(), MemoryError> {
        let turn = Turn::new(role, content);
        self.insert_raw(session_id, record::encode(&turn)).await;
        Ok(())
    }

    async fn recent(&self, session_id: &SessionId, limit: usize) -> Result<Vec<Turn>, MemoryError> {
        let sessions = self.sessions.read().await;
        let Some(records) = sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let mut turns: Vec<Turn> = records
            .iter()
            .rev()
            .filter_map(record::normalize)
            .take(limit)
            .collect();
        turns.reverse();
        Ok(turns)
    }

    async fn count(&self, session_id: &SessionId) -> Result<usize, MemoryError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .map_or(0, Vec::len))
    }
}

/// Human-control flags held in a map.
pub struct InMemoryHumanControlStore {
    states: Arc<RwLock<HashMap<SessionId, HumanControlState>>>,
}

impl InMemoryHumanControlStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryHumanControlStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanControlStore for InMemoryHumanControlStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, session_id: &SessionId) -> Result<Option<HumanControlState>, ControlError> {
        Ok(self.states.read().await.get(session_id).cloned())
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
        self.states
            .write()
            .await
            .insert(session_id.clone(), state.clone());
        Ok(state)
    }
}
