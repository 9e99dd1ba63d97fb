//! # Concierge Core
//!
//! Domain types, traits, and error definitions for the Concierge customer
//! service agent. This crate has **no framework dependencies**: it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the orchestration loop is a trait here: the
//! completion service, the conversation and human-control stores, tool
//! handlers, the escalation notifier and the channel adapter. Implementations
//! live in their respective crates and are injected at construction, so
//! - the process entry point owns every lifecycle
//! - tests swap in scripted mocks
//! - all crates depend inward on core

pub mod error;
pub mod session;
pub mod message;
pub mod provider;
pub mod channel;
pub mod response;
pub mod tool;
pub mod memory;
pub mod control;
pub mod escalation;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use session::{SessionId, Turn, TurnRole};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use channel::{Channel, ChannelAdapter, ChannelContext, ChannelPayload, CustomerIdentity};
pub use response::{AgentResponse, Attachment};
pub use tool::{HandlerOutput, ToolHandler, ToolInvocation, ToolRecord, ToolResult, ToolSpec};
pub use memory::{ConversationStore, MAX_WINDOW};
pub use control::{HumanControlState, HumanControlStore};
pub use escalation::{EscalationNotifier, EscalationRequest};
pub use event::{DomainEvent, EventBus};
