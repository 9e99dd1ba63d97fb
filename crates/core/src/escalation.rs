//! EscalationNotifier trait: alerts the human support team.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::EscalationError;
use crate::session::SessionId;

/// What gets sent to the support team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub reason: String,
    pub summary: String,
    pub session_id: SessionId,
    /// Phone or email the operator should use to reach the customer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_identity: Option<String>,
}

/// Implementations: log-only, signed webhook.
#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, request: &EscalationRequest) -> std::result::Result<(), EscalationError>;
}
