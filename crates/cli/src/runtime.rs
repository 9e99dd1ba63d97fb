//! Process wiring: every long-lived dependency is built here and handed to
//! the components that need it.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use concierge_agent::{EscalationHandler, HumanControlGate, LoopSettings, Orchestrator};
use concierge_channels::{DefaultChannelAdapter, LogNotifier, WebhookNotifier};
use concierge_config::AppConfig;
use concierge_core::channel::ChannelAdapter;
use concierge_core::control::HumanControlStore;
use concierge_core::escalation::EscalationNotifier;
use concierge_core::event::EventBus;
use concierge_core::memory::ConversationStore;
use concierge_core::provider::Provider;
use concierge_core::tool::ToolHandler;
use concierge_memory::{
    ConversationMemory, FileConversationStore, InMemoryConversationStore,
    InMemoryHumanControlStore, SqliteStore,
};
use concierge_tools::catalog::LOOKUP_TOOLS;
use concierge_tools::{DispatchSettings, RemoteLookupHandler, ToolDispatcher, UnconfiguredLookup};
use tracing::{debug, error, warn};

pub struct Runtime {
    pub config: AppConfig,
    pub events: Arc<EventBus>,
    pub conversations: Arc<dyn ConversationStore>,
    pub memory: Arc<ConversationMemory>,
    pub gate: Arc<HumanControlGate>,
    pub adapter: Arc<dyn ChannelAdapter>,
}

impl Runtime {
    pub async fn open(config: AppConfig) -> Result<Self, Box<dyn Error>> {
        let (conversations, control) = open_stores(&config).await?;
        let events = Arc::new(EventBus::default());
        let memory = Arc::new(ConversationMemory::with_window(
            conversations.clone(),
            config.memory.window,
        ));
        let gate = Arc::new(HumanControlGate::new(control, memory.clone(), events.clone()));
        let adapter: Arc<dyn ChannelAdapter> =
            Arc::new(DefaultChannelAdapter::new(config.channels.clone()));

        Ok(Self {
            config,
            events,
            conversations,
            memory,
            gate,
            adapter,
        })
    }

    fn notifier(&self) -> Arc<dyn EscalationNotifier> {
        match &self.config.escalation.webhook_url {
            Some(url) if !url.trim().is_empty() => Arc::new(WebhookNotifier::new(
                url,
                self.config.escalation.shared_secret.clone(),
            )),
            _ => {
                debug!("No escalation webhook configured; escalations are logged only");
                Arc::new(LogNotifier)
            }
        }
    }

    /// Bind the catalog to its handlers. Fails if they do not match one to one.
    pub fn dispatcher(&self) -> Result<ToolDispatcher, Box<dyn Error>> {
        let mut handlers: Vec<Arc<dyn ToolHandler>> = match &self.config.lookup.base_url {
            Some(base_url) if !base_url.trim().is_empty() => RemoteLookupHandler::for_tools(
                LOOKUP_TOOLS,
                base_url,
                self.config.lookup.timeout_secs,
            ),
            _ => {
                warn!("No [lookup] base_url configured; record lookups will fail");
                UnconfiguredLookup::for_tools(LOOKUP_TOOLS)
            }
        };
        handlers.push(Arc::new(EscalationHandler::new(
            self.notifier(),
            Duration::from_secs(self.config.agent.escalation_timeout_secs),
            self.events.clone(),
        )));

        let settings = DispatchSettings {
            summary_max_chars: self.config.agent.tool_summary_max_chars,
            redacted_fields: self.config.agent.redacted_fields.clone(),
        };
        bind_catalog(handlers, settings)
    }

    pub fn orchestrator(
        &self,
        provider: Arc<dyn Provider>,
        model: String,
    ) -> Result<Orchestrator, Box<dyn Error>> {
        Ok(Orchestrator::new(
            provider,
            LoopSettings::from_config(&self.config, model),
            Arc::new(self.dispatcher()?),
            self.memory.clone(),
            self.gate.clone(),
            self.adapter.clone(),
            self.events.clone(),
        ))
    }
}

fn bind_catalog(
    handlers: Vec<Arc<dyn ToolHandler>>,
    settings: DispatchSettings,
) -> Result<ToolDispatcher, Box<dyn Error>> {
    ToolDispatcher::new(concierge_tools::catalog(), handlers, settings).map_err(|e| {
        error!(error = %e, "Tool catalog and handlers disagree");
        format!("refusing to start: the advertised tools cannot all be served ({e})").into()
    })
}

async fn open_sqlite(path: &Path) -> Result<Arc<SqliteStore>, Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(SqliteStore::new(&path.to_string_lossy()).await?))
}

type Stores = (Arc<dyn ConversationStore>, Arc<dyn HumanControlStore>);

async fn open_stores(config: &AppConfig) -> Result<Stores, Box<dyn Error>> {
    let stores: Stores = match config.memory.backend.as_str() {
        "file" => {
            let conversations = Arc::new(FileConversationStore::new(config.memory_path()));
            // Control flags must be visible to every process
            let control = open_sqlite(&AppConfig::config_dir().join("control.sqlite")).await?;
            (conversations, control)
        }
        "in_memory" => (
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryHumanControlStore::new()),
        ),
        _ => {
            let store = open_sqlite(&config.memory_path()).await?;
            (store.clone(), store)
        }
    };
    Ok(stores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.memory.backend = "in_memory".into();
        config
    }

    #[tokio::test]
    async fn dispatcher_covers_whole_catalog() {
        let runtime = Runtime::open(in_memory_config()).await.unwrap();
        let dispatcher = runtime.dispatcher().unwrap();
        assert_eq!(dispatcher.names().len(), concierge_tools::catalog().len());
    }

    #[test]
    fn missing_handler_refuses_startup_with_context() {
        let handlers = UnconfiguredLookup::for_tools(LOOKUP_TOOLS);
        let err = bind_catalog(handlers, DispatchSettings::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("refusing to start"), "{message}");
        assert!(message.contains("escalate_to_human"), "{message}");
    }

    #[tokio::test]
    async fn sqlite_backend_serves_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.memory.path = Some(dir.path().join("c.sqlite").to_string_lossy().into_owned());

        let runtime = Runtime::open(config).await.unwrap();
        let sid = "chat:+15551234567".into();
        runtime.gate.set_human_control(&sid, true).await.unwrap();
        runtime.gate.record_operator_reply(&sid, "On it").await;

        assert!(runtime.gate.is_human_in_control(&sid).await);
        assert_eq!(runtime.conversations.count(&sid).await.unwrap(), 1);
    }
}
