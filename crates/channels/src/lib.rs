//! Channel presentation and escalation delivery for Concierge.
//!
//! - **Adapter**: per-channel system prompt, identity extraction from raw
//!   transport addresses, and rendering of finished replies
//! - **Notifiers**: escalation alerts to the support team (log, signed webhook)

pub mod adapter;
pub mod notifier;

pub use adapter::DefaultChannelAdapter;
pub use notifier::{LogNotifier, WebhookNotifier};
