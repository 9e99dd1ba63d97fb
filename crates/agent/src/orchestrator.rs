//! The orchestration loop.
//!
//! Per inbound customer message:
//!
//! 1. **Gate**: if a human operator holds the session, store the customer
//!    turn and stop (no model call, no reply)
//! 2. **Compose**: channel system prompt + the last 20 stored turns + the
//!    new customer turn
//! 3. **Call the model** with the tool catalog
//! 4. **If a tool call is proposed**: execute the first one only, inject the
//!    invocation and its redacted result, and go back to step 3
//! 5. **If plain text**: attach any resolved document when the customer
//!    asked for it to be sent, persist exactly one customer turn and one
//!    agent turn, and render for the channel
//!
//! Tool failures never abort the loop. A model failure propagates and
//! nothing is persisted or sent.

use std::sync::Arc;

use chrono::Utc;
use concierge_config::AppConfig;
use concierge_core::channel::{
    Channel, ChannelAdapter, ChannelContext, ChannelPayload, CustomerIdentity,
};
use concierge_core::event::{DomainEvent, EventBus};
use concierge_core::message::Message;
use concierge_core::provider::{Provider, ProviderRequest};
use concierge_core::response::{AgentResponse, Attachment};
use concierge_core::session::{SessionId, TurnRole};
use concierge_core::tool::ToolInvocation;
use concierge_memory::ConversationMemory;
use concierge_tools::ToolDispatcher;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::gate::HumanControlGate;
use crate::intent::{self, DocumentIntent};

/// Reply used when the tool-round budget runs out.
pub const HANDOFF_MESSAGE: &str = "I'm sorry, I wasn't able to finish looking that up. \
    I've noted your request and a member of our team will follow up with you shortly.";

/// Reply used when the model returns neither text nor a tool call.
pub const EMPTY_REPLY_FALLBACK: &str =
    "Sorry, I didn't quite catch that. Could you tell me a little more about what you need?";

/// One inbound customer message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub session_id: SessionId,
    pub channel: Channel,
    pub text: String,
    #[serde(default)]
    pub identity: CustomerIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
}

impl InboundMessage {
    pub fn new(session_id: impl Into<SessionId>, channel: Channel, text: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            channel,
            text: text.into(),
            identity: CustomerIdentity::default(),
            customer_name: None,
        }
    }

    pub fn with_identity(mut self, identity: CustomerIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.customer_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    fn context(&self) -> ChannelContext {
        ChannelContext {
            session_id: self.session_id.clone(),
            channel: self.channel,
            identity: self.identity.clone(),
            customer_name: self.customer_name.clone(),
            original_text: self.text.clone(),
        }
    }
}

/// What happened to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A human operator holds the session; nothing is sent.
    Suppressed,
    /// The agent replied.
    Replied {
        response: AgentResponse,
        payload: ChannelPayload,
    },
}

impl InboundOutcome {
    pub fn response(&self) -> Option<&AgentResponse> {
        match self {
            Self::Suppressed => None,
            Self::Replied { response, .. } => Some(response),
        }
    }
}

/// Model parameters and loop limits.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_tool_rounds: u32,
}

impl LoopSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.3,
            max_tokens: None,
            max_tool_rounds: 8,
        }
    }

    /// Settings from config, for an already-resolved model name.
    pub fn from_config(config: &AppConfig, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            max_tool_rounds: config.agent.max_tool_rounds.max(1),
        }
    }
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    settings: LoopSettings,
    dispatcher: Arc<ToolDispatcher>,
    memory: Arc<ConversationMemory>,
    gate: Arc<HumanControlGate>,
    adapter: Arc<dyn ChannelAdapter>,
    events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: LoopSettings,
        dispatcher: Arc<ToolDispatcher>,
        memory: Arc<ConversationMemory>,
        gate: Arc<HumanControlGate>,
        adapter: Arc<dyn ChannelAdapter>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            settings,
            dispatcher,
            memory,
            gate,
            adapter,
            events,
        }
    }

    pub fn gate(&self) -> &HumanControlGate {
        &self.gate
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Handle one inbound customer message.
    ///
    /// Callers serialise calls per session id.
    pub async fn handle_inbound(
        &self,
        inbound: &InboundMessage,
    ) -> concierge_core::Result<InboundOutcome> {
        let session_id = &inbound.session_id;

        self.events.publish(DomainEvent::MessageReceived {
            session_id: session_id.to_string(),
            channel: inbound.channel.to_string(),
            content_preview: inbound.text.chars().take(80).collect(),
            timestamp: Utc::now(),
        });

        if self.gate.is_human_in_control(session_id).await {
            info!(session_id = %session_id, "Session is human-controlled; agent stays silent");
            self.memory
                .append(session_id, TurnRole::Customer, &inbound.text)
                .await;
            self.events.publish(DomainEvent::ReplySuppressed {
                session_id: session_id.to_string(),
                timestamp: Utc::now(),
            });
            return Ok(InboundOutcome::Suppressed);
        }

        let context = inbound.context();
        let mut messages = self.compose(inbound).await;
        let tools = self.dispatcher.definitions();

        let mut rounds: u32 = 0;
        let mut documents: Vec<Attachment> = Vec::new();
        let mut model: String;

        let text = loop {
            let request = ProviderRequest {
                model: self.settings.model.clone(),
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                tools: tools.clone(),
            };

            debug!(session_id = %session_id, round = rounds, messages = messages.len(), "Calling model");
            let response = self.provider.complete(request).await?;
            model = response.model;

            let mut calls = response.message.tool_calls.into_iter();
            let Some(call) = calls.next() else {
                break response.message.content;
            };

            let ignored = calls.count();
            if ignored > 0 {
                warn!(
                    session_id = %session_id,
                    executed = %call.name,
                    ignored,
                    "Model proposed several tool calls; only the first is executed"
                );
            }

            if rounds >= self.settings.max_tool_rounds {
                warn!(
                    session_id = %session_id,
                    rounds,
                    "Tool round limit reached; handing off"
                );
                break HANDOFF_MESSAGE.to_string();
            }
            rounds += 1;

            let arguments = if call.arguments.trim().is_empty() {
                serde_json::Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                    warn!(tool = %call.name, error = %e, "Tool arguments were not valid JSON");
                    serde_json::Value::Object(Default::default())
                })
            };
            let invocation = ToolInvocation {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments,
            };

            let start = std::time::Instant::now();
            let result = self.dispatcher.dispatch(&invocation, &context).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            debug!(
                session_id = %session_id,
                tool = %result.tool_name,
                success = result.success,
                duration_ms,
                round = rounds,
                "Tool executed"
            );
            self.events.publish(DomainEvent::ToolExecuted {
                session_id: session_id.to_string(),
                tool_name: result.tool_name.clone(),
                success: result.success,
                duration_ms,
                timestamp: Utc::now(),
            });

            if let Some(doc) = result.document {
                if !documents.iter().any(|d| d.url == doc.url) {
                    documents.push(doc);
                }
            }

            let call_id = call.id.clone();
            messages.push(Message::tool_invocation(call));
            messages.push(Message::tool_result(call_id, result.summary));
        };

        let text = if text.trim().is_empty() {
            warn!(session_id = %session_id, "Model returned an empty reply");
            EMPTY_REPLY_FALLBACK.to_string()
        } else {
            text.trim().to_string()
        };

        let mut response = AgentResponse::text(text);
        let intent = intent::classify(&inbound.text);
        if intent == DocumentIntent::SendDocument {
            response.attachments = documents;
        } else if !documents.is_empty() {
            debug!(
                session_id = %session_id,
                candidates = documents.len(),
                "Customer asked about content; document not attached"
            );
        }

        self.memory
            .append(session_id, TurnRole::Customer, &inbound.text)
            .await;
        self.memory
            .append(session_id, TurnRole::Agent, &response.text)
            .await;

        self.events.publish(DomainEvent::ResponseGenerated {
            session_id: session_id.to_string(),
            model,
            tool_rounds: rounds,
            attachments: response.attachments.len(),
            timestamp: Utc::now(),
        });
        info!(
            session_id = %session_id,
            channel = %inbound.channel,
            tool_rounds = rounds,
            attachments = response.attachments.len(),
            "Reply ready"
        );

        let payload = self.adapter.render(inbound.channel, &response);
        Ok(InboundOutcome::Replied { response, payload })
    }

    /// System prompt, stored window, new customer turn.
    async fn compose(&self, inbound: &InboundMessage) -> Vec<Message> {
        let mut system = self.adapter.system_prompt(inbound.channel);
        if let Some(name) = &inbound.customer_name {
            system.push_str(&format!("\n\nThe customer's name is {name}."));
        }

        let history = self.memory.load(&inbound.session_id).await;
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(system));
        messages.extend(history.iter().map(Message::from));
        messages.push(Message::user(&inbound.text));
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use concierge_core::message::Role;
    use concierge_memory::{InMemoryConversationStore, InMemoryHumanControlStore};
    use concierge_tools::catalog::{GET_INVOICE, GET_QUOTE};
    use serde_json::json;

    struct Harness {
        orchestrator: Orchestrator,
        provider: Arc<ScriptedProvider>,
        store: Arc<InMemoryConversationStore>,
        lookups: Arc<LookupTable>,
        events: Arc<EventBus>,
    }

    fn harness(provider: ScriptedProvider, max_tool_rounds: u32) -> Harness {
        let provider = Arc::new(provider);
        let store = Arc::new(InMemoryConversationStore::new());
        let memory = Arc::new(ConversationMemory::new(store.clone()));
        let events = Arc::new(EventBus::default());
        let gate = Arc::new(HumanControlGate::new(
            Arc::new(InMemoryHumanControlStore::new()),
            memory.clone(),
            events.clone(),
        ));
        let lookups = Arc::new(LookupTable::with_sample_records());
        let dispatcher = Arc::new(lookups.dispatcher(events.clone()));
        let mut settings = LoopSettings::new("mock-model");
        settings.max_tool_rounds = max_tool_rounds;

        let orchestrator = Orchestrator::new(
            provider.clone(),
            settings,
            dispatcher,
            memory,
            gate,
            Arc::new(concierge_channels::DefaultChannelAdapter::default()),
            events.clone(),
        );
        Harness {
            orchestrator,
            provider,
            store,
            lookups,
            events,
        }
    }

    fn chat(session: &str, text: &str) -> InboundMessage {
        InboundMessage::new(session, Channel::Chat, text)
            .with_identity(CustomerIdentity::phone("+15551234567"))
            .with_customer_name("Jane")
    }

    async fn stored(h: &Harness, session: &str) -> Vec<(TurnRole, String)> {
        use concierge_core::memory::ConversationStore;
        h.store
            .recent(&session.into(), 100)
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.role, t.content))
            .collect()
    }

    #[tokio::test]
    async fn plain_text_reply() {
        let h = harness(ScriptedProvider::new(vec![text_response("Hi Jane! How can I help?")]), 8);
        let outcome = h.orchestrator.handle_inbound(&chat("S1", "hello")).await.unwrap();

        let response = outcome.response().unwrap();
        assert_eq!(response.text, "Hi Jane! How can I help?");
        assert!(!response.has_attachments());

        let requests = h.provider.requests();
        let request = &requests[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("Jane"));
        assert_eq!(request.messages.last().unwrap().content, "hello");
        assert_eq!(request.tools.len(), 5);
    }

    #[tokio::test]
    async fn human_control_suppresses_model_and_reply() {
        let h = harness(ScriptedProvider::new(vec![]), 8);
        let sid = SessionId::from("S1");
        h.orchestrator.gate().set_human_control(&sid, true).await.unwrap();

        let outcome = h.orchestrator.handle_inbound(&chat("S1", "anyone there?")).await.unwrap();
        assert_eq!(outcome, InboundOutcome::Suppressed);
        assert_eq!(h.provider.call_count(), 0);

        let turns = stored(&h, "S1").await;
        assert_eq!(turns, vec![(TurnRole::Customer, "anyone there?".to_string())]);
    }

    #[tokio::test]
    async fn released_session_sees_operator_reply() {
        let h = harness(ScriptedProvider::new(vec![text_response("Glad that's sorted.")]), 8);
        let sid = SessionId::from("S1");
        let gate = h.orchestrator.gate();
        gate.set_human_control(&sid, true).await.unwrap();
        h.orchestrator.handle_inbound(&chat("S1", "change my address")).await.unwrap();
        gate.record_operator_reply(&sid, "Done, your address is updated.").await;
        gate.set_human_control(&sid, false).await.unwrap();

        h.orchestrator.handle_inbound(&chat("S1", "thanks!")).await.unwrap();
        let requests = h.provider.requests();
        let request = &requests[0];
        let contents: Vec<&str> = request.messages.iter().map(|m| m.content.as_str()).collect();
        assert!(contents.contains(&"change my address"));
        assert!(contents.contains(&"Done, your address is updated."));
    }

    #[tokio::test]
    async fn exactly_one_pair_persisted_per_message() {
        for rounds in 0..4 {
            let mut script: Vec<_> = (0..rounds)
                .map(|_| tool_response(GET_INVOICE, json!({"invoice_number": "Q100-ABCDE"})))
                .collect();
            script.push(text_response("All done."));
            let h = harness(ScriptedProvider::new(script), 8);

            h.orchestrator.handle_inbound(&chat("S1", "invoice status?")).await.unwrap();
            let turns = stored(&h, "S1").await;
            assert_eq!(
                turns,
                vec![
                    (TurnRole::Customer, "invoice status?".to_string()),
                    (TurnRole::Agent, "All done.".to_string()),
                ],
                "rounds = {rounds}"
            );
            assert_eq!(h.provider.call_count(), rounds + 1);
        }
    }

    #[tokio::test]
    async fn invoice_scenario() {
        let h = harness(
            ScriptedProvider::new(vec![
                tool_response(GET_INVOICE, json!({"invoice_number": "INV-Q100-ABCDE"})),
                echo_tool_result(),
            ]),
            8,
        );
        let outcome = h
            .orchestrator
            .handle_inbound(&chat("S1", "Can I get an update on invoice INV-Q100-ABCDE?"))
            .await
            .unwrap();

        assert_eq!(h.lookups.seen(GET_INVOICE), vec![json!({"invoice_number": "Q100-ABCDE"})]);
        let response = outcome.response().unwrap();
        assert!(response.text.contains("Jane"), "{}", response.text);
        assert!(response.text.contains("Out for delivery"), "{}", response.text);
        assert!(!response.has_attachments());
    }

    #[tokio::test]
    async fn send_vs_ask_uses_same_record() {
        let ask = harness(
            ScriptedProvider::new(vec![tool_response(GET_QUOTE, json!({})), text_response("Your total is $1,200.")]),
            8,
        );
        let outcome = ask
            .orchestrator
            .handle_inbound(&chat("S1", "What's the total on my quote?"))
            .await
            .unwrap();
        assert!(!outcome.response().unwrap().has_attachments());

        let send = harness(
            ScriptedProvider::new(vec![tool_response(GET_QUOTE, json!({})), text_response("Here it is!")]),
            8,
        );
        let outcome = send
            .orchestrator
            .handle_inbound(&chat("S1", "Please resend my quote PDF"))
            .await
            .unwrap();
        let response = outcome.response().unwrap();
        assert_eq!(response.attachments.len(), 1);
        assert!(!response.text.contains(&response.attachments[0].url));

        assert_eq!(ask.lookups.seen(GET_QUOTE), send.lookups.seen(GET_QUOTE));
        let InboundOutcome::Replied { payload, .. } = outcome else {
            panic!("expected a reply");
        };
        assert_eq!(payload.transport_calls(), 2);
    }

    #[tokio::test]
    async fn failing_tool_still_replies() {
        let h = harness(
            ScriptedProvider::new(vec![
                tool_response("get_order_status", json!({"order_number": "BROKEN"})),
                echo_tool_result(),
            ]),
            8,
        );
        let outcome = h.orchestrator.handle_inbound(&chat("S1", "where is order BROKEN?")).await.unwrap();
        let response = outcome.response().unwrap();
        assert!(!response.text.is_empty());
        assert!(response.text.contains("lookup failed"));
    }

    #[tokio::test]
    async fn model_failure_propagates_and_persists_nothing() {
        let h = harness(ScriptedProvider::failing(), 8);
        let result = h.orchestrator.handle_inbound(&chat("S1", "hello")).await;
        assert!(matches!(result, Err(concierge_core::Error::Provider(_))));
        assert!(stored(&h, "S1").await.is_empty());
    }

    #[tokio::test]
    async fn only_first_tool_call_executes() {
        let h = harness(
            ScriptedProvider::new(vec![
                multi_tool_response(&[
                    (GET_QUOTE, json!({"quote_number": "Q1"})),
                    (GET_INVOICE, json!({"invoice_number": "I1"})),
                ]),
                text_response("ok"),
            ]),
            8,
        );
        h.orchestrator.handle_inbound(&chat("S1", "quote and invoice?")).await.unwrap();
        assert_eq!(h.lookups.seen(GET_QUOTE).len(), 1);
        assert!(h.lookups.seen(GET_INVOICE).is_empty());

        let requests = h.provider.requests();
        let second = &requests[1];
        let invocation = &second.messages[second.messages.len() - 2];
        assert_eq!(invocation.tool_calls.len(), 1);
        assert_eq!(second.messages.last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn round_limit_hands_off() {
        let script = (0..5)
            .map(|_| tool_response(GET_QUOTE, json!({})))
            .collect();
        let h = harness(ScriptedProvider::new(script), 2);
        let outcome = h.orchestrator.handle_inbound(&chat("S1", "quote?")).await.unwrap();
        assert_eq!(outcome.response().unwrap().text, HANDOFF_MESSAGE);
        assert_eq!(h.lookups.seen(GET_QUOTE).len(), 2);
        assert_eq!(stored(&h, "S1").await.len(), 2);
    }

    #[tokio::test]
    async fn history_window_is_bounded() {
        let h = harness(ScriptedProvider::new(vec![text_response("ok")]), 8);
        use concierge_core::memory::ConversationStore;
        for i in 0..30 {
            h.store
                .append(&"S1".into(), TurnRole::Customer, &format!("old {i}"))
                .await
                .unwrap();
        }
        h.orchestrator.handle_inbound(&chat("S1", "new")).await.unwrap();
        // system + 20 history + new turn
        assert_eq!(h.provider.requests()[0].messages.len(), 22);
    }

    #[tokio::test]
    async fn events_are_published() {
        let h = harness(
            ScriptedProvider::new(vec![tool_response(GET_QUOTE, json!({})), text_response("done")]),
            8,
        );
        let mut rx = h.events.subscribe();
        h.orchestrator.handle_inbound(&chat("S1", "quote?")).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::MessageReceived { .. } => "received",
                DomainEvent::ToolExecuted { .. } => "tool",
                DomainEvent::ResponseGenerated { tool_rounds, .. } => {
                    assert_eq!(*tool_rounds, 1);
                    "response"
                }
                _ => "other",
            });
        }
        assert_eq!(kinds, vec!["received", "tool", "response"]);
    }

    #[tokio::test]
    async fn empty_model_text_gets_fallback() {
        let h = harness(ScriptedProvider::new(vec![text_response("   ")]), 8);
        let outcome = h.orchestrator.handle_inbound(&chat("S1", "hm")).await.unwrap();
        assert_eq!(outcome.response().unwrap().text, EMPTY_REPLY_FALLBACK);
    }
}
