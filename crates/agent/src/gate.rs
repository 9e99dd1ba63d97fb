//! The human-control gate.
//!
//! While a session is human-controlled the agent never composes or sends a
//! reply. A failed store read counts as agent-controlled.

use std::sync::Arc;

use chrono::Utc;
use concierge_core::control::{HumanControlState, HumanControlStore};
use concierge_core::event::{DomainEvent, EventBus};
use concierge_core::session::{SessionId, TurnRole};
use concierge_memory::ConversationMemory;
use tracing::{info, warn};

pub struct HumanControlGate {
    store: Arc<dyn HumanControlStore>,
    memory: Arc<ConversationMemory>,
    events: Arc<EventBus>,
}

impl HumanControlGate {
    pub fn new(
        store: Arc<dyn HumanControlStore>,
        memory: Arc<ConversationMemory>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            memory,
            events,
        }
    }

    /// Absent state and read failures both mean the agent may reply.
    pub async fn is_human_in_control(&self, session_id: &SessionId) -> bool {
        match self.store.get(session_id).await {
            Ok(state) => state.is_some_and(|s| s.is_human_controlled),
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    backend = self.store.name(),
                    error = %e,
                    "Human-control read failed; agent stays in control"
                );
                false
            }
        }
    }

    /// Operator takeover or release. Errors propagate: the operator must
    /// know whether the switch happened.
    pub async fn set_human_control(
        &self,
        session_id: &SessionId,
        human_controlled: bool,
    ) -> concierge_core::Result<HumanControlState> {
        let state = self.store.set(session_id, human_controlled).await?;
        info!(session_id = %session_id, human_controlled, "Human control changed");
        self.events.publish(DomainEvent::HumanControlChanged {
            session_id: session_id.to_string(),
            human_controlled,
            timestamp: Utc::now(),
        });
        Ok(state)
    }

    /// Store an operator's message as an agent turn so the agent sees it
    /// once control is handed back.
    pub async fn record_operator_reply(&self, session_id: &SessionId, text: &str) {
        self.memory.append(session_id, TurnRole::Agent, text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_core::error::ControlError;
    use concierge_memory::{InMemoryConversationStore, InMemoryHumanControlStore};

    struct UnreachableStore;

    #[async_trait]
    impl HumanControlStore for UnreachableStore {
        fn name(&self) -> &str {
            "unreachable"
        }
        async fn get(&self, _: &SessionId) -> Result<Option<HumanControlState>, ControlError> {
            Err(ControlError::Unavailable("connection refused".into()))
        }
        async fn set(&self, _: &SessionId, _: bool) -> Result<HumanControlState, ControlError> {
            Err(ControlError::Unavailable("connection refused".into()))
        }
    }

    fn gate(store: Arc<dyn HumanControlStore>) -> (HumanControlGate, Arc<ConversationMemory>, Arc<EventBus>) {
        let memory = Arc::new(ConversationMemory::new(Arc::new(InMemoryConversationStore::new())));
        let events = Arc::new(EventBus::default());
        (HumanControlGate::new(store, memory.clone(), events.clone()), memory, events)
    }

    #[tokio::test]
    async fn absent_means_agent() {
        let (gate, _, _) = gate(Arc::new(InMemoryHumanControlStore::new()));
        assert!(!gate.is_human_in_control(&"S1".into()).await);
    }

    #[tokio::test]
    async fn takeover_and_release() {
        let (gate, _, events) = gate(Arc::new(InMemoryHumanControlStore::new()));
        let mut rx = events.subscribe();
        let sid = SessionId::from("S1");

        gate.set_human_control(&sid, true).await.unwrap();
        assert!(gate.is_human_in_control(&sid).await);
        assert!(matches!(
            rx.recv().await.unwrap().as_ref(),
            DomainEvent::HumanControlChanged { human_controlled: true, .. }
        ));

        gate.set_human_control(&sid, false).await.unwrap();
        assert!(!gate.is_human_in_control(&sid).await);
    }

    #[tokio::test]
    async fn read_failure_defaults_to_agent() {
        let (gate, _, _) = gate(Arc::new(UnreachableStore));
        assert!(!gate.is_human_in_control(&"S1".into()).await);
    }

    #[tokio::test]
    async fn write_failure_is_reported() {
        let (gate, _, _) = gate(Arc::new(UnreachableStore));
        assert!(gate.set_human_control(&"S1".into(), true).await.is_err());
    }

    #[tokio::test]
    async fn operator_reply_becomes_agent_turn() {
        let (gate, memory, _) = gate(Arc::new(InMemoryHumanControlStore::new()));
        let sid = SessionId::from("S1");
        gate.record_operator_reply(&sid, "I've updated your delivery address.").await;
        let turns = memory.load(&sid).await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::Agent);
    }
}
