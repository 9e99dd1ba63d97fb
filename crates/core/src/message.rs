//! Prompt message types.
//!
//! These are the values exchanged with the completion service for one
//! inbound customer message: system prompt, stored history, the new customer
//! turn, and the tool-invocation / tool-result pseudo-turns appended while
//! the loop runs. They are not the durable form of a conversation; see
//! [`crate::session::Turn`] for that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::{Turn, TurnRole};

/// The role of a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The customer
    User,
    /// The agent
    Assistant,
    /// Channel instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who authored this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new customer message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create an assistant message that proposes exactly one tool call.
    pub fn tool_invocation(call: MessageToolCall) -> Self {
        let mut msg = Self::with_role(Role::Assistant, "");
        msg.tool_calls = vec![call];
        msg
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            TurnRole::Customer => Role::User,
            TurnRole::Agent => Role::Assistant,
        };
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: turn.content.clone(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: turn.created_at,
        }
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Where is my order?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Where is my order?");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn tool_invocation_carries_single_call() {
        let msg = Message::tool_invocation(MessageToolCall {
            id: "call_1".into(),
            name: "get_invoice".into(),
            arguments: "{}".into(),
        });
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.tool_calls.len(), 1);
    }

    #[test]
    fn turn_maps_to_prompt_role() {
        let customer = Turn::new(TurnRole::Customer, "hi");
        let agent = Turn::new(TurnRole::Agent, "hello");
        assert_eq!(Message::from(&customer).role, Role::User);
        assert_eq!(Message::from(&agent).role, Role::Assistant);
        assert_eq!(Message::from(&agent).timestamp, agent.created_at);
    }

    #[test]
    fn tool_result_serializes_call_id() {
        let msg = Message::tool_result("call_9", "get_quote result: {}");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("call_9"));
        assert!(json.contains("\"tool\""));
    }
}
