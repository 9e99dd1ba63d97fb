//! The orchestration core of Concierge.
//!
//! One inbound customer message goes through a **Gate → Compose → Call →
//! Act → Reply** cycle:
//!
//! 1. **Gate** on human control (silent when an operator holds the session)
//! 2. **Compose** the channel prompt, stored history and the new turn
//! 3. **Call** the completion service with the tool catalog
//! 4. **Act** on at most one proposed tool call, feed the result back, repeat
//! 5. **Reply** with text, attach documents only when asked, persist the pair
//!
//! The loop ends when the model answers with text or the round limit is hit.

pub mod escalation;
pub mod gate;
pub mod intent;
pub mod orchestrator;

#[cfg(test)]
mod test_helpers;

pub use escalation::EscalationHandler;
pub use gate::HumanControlGate;
pub use intent::{DocumentIntent, classify};
pub use orchestrator::{
    EMPTY_REPLY_FALLBACK, HANDOFF_MESSAGE, InboundMessage, InboundOutcome, LoopSettings,
    Orchestrator,
};
