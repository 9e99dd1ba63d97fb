//! Bounded, best-effort view over a [`ConversationStore`].
//!
//! Losing memory must never block a reply: append failures are logged and
//! swallowed, load failures read as an empty history.

use std::sync::Arc;

use concierge_core::memory::{ConversationStore, MAX_WINDOW};
use concierge_core::session::{SessionId, Turn, TurnRole};
use tracing::{debug, warn};

pub struct ConversationMemory {
    store: Arc<dyn ConversationStore>,
    window: usize,
}

impl ConversationMemory {
    /// Wrap a store with the full 20-turn window.
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self::with_window(store, MAX_WINDOW)
    }

    /// Wrap a store with a smaller window. Values above 20 are clamped.
    pub fn with_window(store: Arc<dyn ConversationStore>, window: usize) -> Self {
        Self {
            store,
            window: window.clamp(1, MAX_WINDOW),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn backend(&self) -> &str {
        self.store.name()
    }

    /// Append a turn. Never fails.
    pub async fn append(&self, session_id: &SessionId, role: TurnRole, content: &str) {
        if let Err(e) = self.store.append(session_id, role, content).await {
            warn!(
                session_id = %session_id,
                role = %role,
                backend = self.store.name(),
                error = %e,
                "Failed to persist turn; continuing without it"
            );
        }
    }

    /// The most recent turns, oldest first, never more than the window.
    pub async fn load(&self, session_id: &SessionId) -> Vec<Turn> {
        let mut turns = match self.store.recent(session_id, self.window).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    backend = self.store.name(),
                    error = %e,
                    "Failed to load history; treating as empty"
                );
                return Vec::new();
            }
        };

        // Stable: equal timestamps keep store order
        turns.sort_by_key(|t| t.created_at);
        let skip = turns.len().saturating_sub(self.window);
        let turns = turns.split_off(skip);
        debug!(session_id = %session_id, turns = turns.len(), "Loaded history window");
        turns
    }
}
