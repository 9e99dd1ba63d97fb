//! HumanControlStore trait: the per-session operator override switch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::ControlError;
use crate::session::SessionId;

/// Stored state for one session. Absent means agent-controlled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanControlState {
    pub is_human_controlled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Implementations: SQLite, in-memory.
#[async_trait]
pub trait HumanControlStore: Send + Sync {
    fn name(&self) -> &str;

    /// Read the state for a session (`None` if never set).
    async fn get(
        &self,
        session_id: &SessionId,
    ) -> std::result::Result<Option<HumanControlState>, ControlError>;

    /// Set the flag for a session (last writer wins).
    async fn set(
        &self,
        session_id: &SessionId,
        human_controlled: bool,
    ) -> std::result::Result<HumanControlState, ControlError>;
}
