//! Session and turn domain types.
//!
//! A session is one continuous, channel-qualified customer conversation. It
//! owns an ordered sequence of turns and is only ever mutated by appending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::Channel;

/// Opaque, channel-qualified session identifier (e.g. `chat:+15551234567`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Qualify a raw channel address with its channel name.
    pub fn qualified(channel: Channel, address: &str) -> Self {
        Self(format!("{}:{}", channel.as_str(), address.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a persisted turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Customer,
    Agent,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for TurnRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One customer- or agent-authored message within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn stamped with the current time.
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_session_id() {
        let id = SessionId::qualified(Channel::Chat, " +15551234567 ");
        assert_eq!(id.as_str(), "chat:+15551234567");

        let id = SessionId::qualified(Channel::Email, "jane@example.com");
        assert_eq!(id.to_string(), "email:jane@example.com");
    }

    #[test]
    fn turn_role_serializes_lowercase() {
        let turn = Turn::new(TurnRole::Customer, "Where is my order?");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"customer\""));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }

    #[test]
    fn session_id_is_transparent() {
        let json = serde_json::to_string(&SessionId::from("S1")).unwrap();
        assert_eq!(json, "\"S1\"");
    }
}
