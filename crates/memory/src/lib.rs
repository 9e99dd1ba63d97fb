//! Conversation memory and human-control stores for Concierge.

pub mod record;
pub mod in_memory;
pub mod file_backend;
pub mod window;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::{InMemoryConversationStore, InMemoryHumanControlStore};
pub use file_backend::FileConversationStore;
pub use window::ConversationMemory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
