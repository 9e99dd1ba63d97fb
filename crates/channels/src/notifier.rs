//! Escalation notifiers: alert the human support team.
//!
//! [`WebhookNotifier`] POSTs the request as JSON. When a shared secret is
//! configured the body is signed with HMAC-SHA256 and the digest sent as
//! `X-Concierge-Signature: sha256=<hex>`, so the receiver can verify it with
//! [`verify_signature`].

use std::time::Duration;

use async_trait::async_trait;
use concierge_core::error::EscalationError;
use concierge_core::escalation::{EscalationNotifier, EscalationRequest};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Concierge-Signature";

/// Logs the escalation and reports success. Used when no webhook is set.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl EscalationNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, request: &EscalationRequest) -> Result<(), EscalationError> {
        info!(
            session_id = %request.session_id,
            reason = %request.reason,
            summary = %request.summary,
            contact = request.channel_identity.as_deref().unwrap_or("-"),
            "Escalation raised"
        );
        Ok(())
    }
}

pub struct WebhookNotifier {
    url: String,
    shared_secret: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, shared_secret: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            url: url.into(),
            shared_secret: shared_secret.filter(|s| !s.is_empty()),
            client,
        }
    }
}

/// `sha256=<hex digest>` of `payload` under `secret`.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String, EscalationError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| EscalationError::NotConfigured(format!("invalid shared secret: {e}")))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check of a `sha256=<hex>` (or bare hex) signature.
pub fn verify_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let sig_hex = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(provided) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

#[async_trait]
impl EscalationNotifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, request: &EscalationRequest) -> Result<(), EscalationError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| EscalationError::DeliveryFailed(format!("serialize: {e}")))?;

        let mut post = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.shared_secret {
            post = post.header(SIGNATURE_HEADER, sign(secret, &body)?);
        }

        let response = post
            .body(body)
            .send()
            .await
            .map_err(|e| EscalationError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EscalationError::DeliveryFailed(format!(
                "webhook returned HTTP {status}"
            )));
        }

        info!(session_id = %request.session_id, "Escalation delivered to webhook");
        Ok(())
    }
}
