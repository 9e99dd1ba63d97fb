//! Tool catalog and dispatch for Concierge.
//!
//! The catalog is a fixed, channel-independent list of tool specifications.
//! The dispatcher binds exactly one [`ToolHandler`] to each specification and
//! turns model-proposed invocations into prompt-safe [`ToolResult`]s.
//!
//! [`ToolHandler`]: concierge_core::ToolHandler
//! [`ToolResult`]: concierge_core::ToolResult

pub mod catalog;
pub mod dispatcher;
pub mod redact;
pub mod remote;

pub use catalog::{catalog, definitions};
pub use dispatcher::{DispatchSettings, ToolDispatcher};
pub use redact::Redactor;
pub use remote::{RemoteLookupHandler, UnconfiguredLookup};
