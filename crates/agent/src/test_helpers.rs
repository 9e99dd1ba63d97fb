//! Shared test helpers for orchestration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::channel::ChannelContext;
use concierge_core::error::{ProviderError, ToolError};
use concierge_core::event::EventBus;
use concierge_core::message::{Message, MessageToolCall, Role};
use concierge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use concierge_core::response::Attachment;
use concierge_core::tool::{HandlerOutput, ToolHandler, ToolRecord};
use concierge_tools::catalog::{self, GET_INVOICE, GET_ORDER_STATUS, GET_QUOTE, SEARCH_KNOWLEDGE_BASE};
use concierge_tools::{DispatchSettings, ToolDispatcher};
use serde_json::{Value, json};

use crate::escalation::EscalationHandler;

static NEXT_CALL_ID: AtomicUsize = AtomicUsize::new(1);

/// One scripted model turn.
#[derive(Clone)]
pub enum Step {
    Respond(ProviderResponse),
    /// Answer with the customer's name and the latest tool result.
    EchoToolResult,
    Fail,
}

/// A mock provider that plays back scripted steps in order.
///
/// Panics if more calls are made than steps provided.
pub struct ScriptedProvider {
    steps: Vec<Step>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::new(vec![Step::Fail])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let step = {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len();
            requests.push(request.clone());
            self.steps.get(index).cloned().unwrap_or_else(|| {
                panic!("ScriptedProvider: no more steps (call #{index}, have {})", self.steps.len())
            })
        };

        match step {
            Step::Respond(response) => Ok(response),
            Step::Fail => Err(ProviderError::Network("connection reset".into())),
            Step::EchoToolResult => {
                let name = request
                    .messages
                    .iter()
                    .find(|m| m.role == Role::System)
                    .and_then(|m| m.content.split("The customer's name is ").nth(1))
                    .map(|rest| rest.trim_end_matches('.').trim().to_string())
                    .unwrap_or_else(|| "there".into());
                let result = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::Tool)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                Ok(wrap(Message::assistant(format!("Hi {name}! {result}"))))
            }
        }
    }
}

fn wrap(message: Message) -> ProviderResponse {
    ProviderResponse {
        message,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
    }
}

fn tool_call(name: &str, args: Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{}", NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed)),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}

pub fn text_response(text: &str) -> Step {
    Step::Respond(wrap(Message::assistant(text)))
}

pub fn tool_response(name: &str, args: Value) -> Step {
    multi_tool_response(&[(name, args)])
}

pub fn multi_tool_response(calls: &[(&str, Value)]) -> Step {
    let mut message = Message::assistant("");
    message.tool_calls = calls
        .iter()
        .map(|(name, args)| tool_call(name, args.clone()))
        .collect();
    Step::Respond(wrap(message))
}

pub fn echo_tool_result() -> Step {
    Step::EchoToolResult
}

/// In-memory business records behind the four lookup tools.
///
/// Records every argument set each tool is called with. Order `BROKEN`
/// fails the way an unreachable backend would.
pub struct LookupTable {
    records: HashMap<(String, String), ToolRecord>,
    seen: Mutex<HashMap<String, Vec<Value>>>,
}

impl LookupTable {
    pub fn with_sample_records() -> Self {
        let mut records = HashMap::new();
        records.insert(
            (GET_INVOICE.to_string(), "Q100-ABCDE".to_string()),
            ToolRecord::data(json!({
                "invoice_number": "Q100-ABCDE",
                "customer_name": "Jane",
                "delivery_status": "Out for delivery",
                "total": "$420.00",
                "cost_price": "$250.00",
            }))
            .with_document(Attachment {
                url: "https://docs.example.com/invoices/Q100-ABCDE.pdf".into(),
                caption: "Invoice Q100-ABCDE".into(),
                id: "Q100-ABCDE".into(),
            }),
        );
        records.insert(
            (GET_QUOTE.to_string(), "+15551234567".to_string()),
            ToolRecord::data(json!({
                "quote_number": "Q-2024-001",
                "total": "$1,200.00",
                "margin": "31%",
            }))
            .with_document(Attachment {
                url: "https://docs.example.com/quotes/Q-2024-001.pdf".into(),
                caption: "Quote Q-2024-001".into(),
                id: "Q-2024-001".into(),
            }),
        );
        records.insert(
            (GET_QUOTE.to_string(), "Q1".to_string()),
            ToolRecord::data(json!({"quote_number": "Q1", "total": "$80.00"})),
        );
        records.insert(
            (GET_ORDER_STATUS.to_string(), "+15551234567".to_string()),
            ToolRecord::data(json!({"order_number": "1001", "status": "Shipped"})),
        );

        Self {
            records,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Arguments the named tool received, in call order.
    pub fn seen(&self, tool: &str) -> Vec<Value> {
        self.seen.lock().unwrap().get(tool).cloned().unwrap_or_default()
    }

    fn lookup(&self, tool: &str, arguments: Value) -> Result<HandlerOutput, ToolError> {
        self.seen
            .lock()
            .unwrap()
            .entry(tool.to_string())
            .or_default()
            .push(arguments.clone());

        if tool == SEARCH_KNOWLEDGE_BASE {
            return Ok(HandlerOutput::Found(ToolRecord::data(json!({
                "articles": [{"title": "Returns", "body": "Returns are accepted within 30 days."}]
            }))));
        }

        let key = arguments
            .as_object()
            .and_then(|args| args.values().find_map(Value::as_str))
            .unwrap_or_default()
            .to_string();
        if key == "BROKEN" {
            return Err(ToolError::ExecutionFailed {
                tool_name: tool.to_string(),
                reason: "backend unreachable".into(),
            });
        }

        Ok(self
            .records
            .get(&(tool.to_string(), key))
            .cloned()
            .map_or(HandlerOutput::NotFound, HandlerOutput::Found))
    }

    /// A dispatcher over the full catalog backed by this table.
    pub fn dispatcher(self: &Arc<Self>, events: Arc<EventBus>) -> ToolDispatcher {
        let mut handlers: Vec<Arc<dyn ToolHandler>> = [GET_ORDER_STATUS, GET_QUOTE, GET_INVOICE, SEARCH_KNOWLEDGE_BASE]
            .into_iter()
            .map(|tool| {
                Arc::new(TableHandler {
                    tool,
                    table: Arc::clone(self),
                }) as Arc<dyn ToolHandler>
            })
            .collect();
        handlers.push(Arc::new(EscalationHandler::new(
            Arc::new(concierge_channels::LogNotifier),
            Duration::from_secs(5),
            events,
        )));

        ToolDispatcher::new(catalog::catalog(), handlers, DispatchSettings::default())
            .unwrap()
    }
}

struct TableHandler {
    tool: &'static str,
    table: Arc<LookupTable>,
}

#[async_trait]
impl ToolHandler for TableHandler {
    fn name(&self) -> &str {
        self.tool
    }

    async fn handle(&self, arguments: Value, _context: &ChannelContext) -> Result<HandlerOutput, ToolError> {
        self.table.lookup(self.tool, arguments)
    }
}
