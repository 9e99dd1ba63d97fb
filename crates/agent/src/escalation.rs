//! Built-in handler for `escalate_to_human`.
//!
//! Wraps the injected [`EscalationNotifier`]. Delivery is bounded by a
//! timeout and never fails the tool call: the outcome is reported back to the
//! model so the closing message can say whether the team was reached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use concierge_core::channel::ChannelContext;
use concierge_core::error::{EscalationError, ToolError};
use concierge_core::escalation::{EscalationNotifier, EscalationRequest};
use concierge_core::event::{DomainEvent, EventBus};
use concierge_core::tool::{HandlerOutput, ToolHandler, ToolRecord};
use concierge_tools::catalog::ESCALATE_TO_HUMAN;
use serde_json::{Value, json};
use tracing::{info, warn};

pub struct EscalationHandler {
    notifier: Arc<dyn EscalationNotifier>,
    timeout: Duration,
    events: Arc<EventBus>,
}

impl EscalationHandler {
    pub fn new(notifier: Arc<dyn EscalationNotifier>, timeout: Duration, events: Arc<EventBus>) -> Self {
        Self {
            notifier,
            timeout,
            events,
        }
    }

    async fn deliver(&self, request: &EscalationRequest) -> Result<(), EscalationError> {
        match tokio::time::timeout(self.timeout, self.notifier.notify(request)).await {
            Ok(result) => result,
            Err(_) => Err(EscalationError::Timeout(self.timeout.as_secs())),
        }
    }
}

fn text_arg(arguments: &Value, key: &str) -> String {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl ToolHandler for EscalationHandler {
    fn name(&self) -> &str {
        ESCALATE_TO_HUMAN
    }

    async fn handle(
        &self,
        arguments: Value,
        context: &ChannelContext,
    ) -> Result<HandlerOutput, ToolError> {
        let request = EscalationRequest {
            reason: text_arg(&arguments, "reason"),
            summary: text_arg(&arguments, "summary"),
            session_id: context.session_id.clone(),
            channel_identity: context.identity_value().map(str::to_string),
        };

        let outcome = self.deliver(&request).await;
        let delivered = outcome.is_ok();

        self.events.publish(DomainEvent::EscalationRaised {
            session_id: context.session_id.to_string(),
            delivered,
            timestamp: Utc::now(),
        });

        let data = match outcome {
            Ok(()) => {
                info!(
                    session_id = %context.session_id,
                    notifier = self.notifier.name(),
                    "Escalated to support team"
                );
                json!({
                    "escalated": true,
                    "message": "The support team has been notified and will follow up with the customer."
                })
            }
            Err(e) => {
                warn!(
                    session_id = %context.session_id,
                    notifier = self.notifier.name(),
                    error = %e,
                    "Escalation could not be delivered"
                );
                json!({
                    "escalated": false,
                    "message": "The support team could not be reached right now. Tell the customer \
                                their request is noted and suggest trying again shortly."
                })
            }
        };

        Ok(HandlerOutput::Found(ToolRecord::data(data)))
    }
}
