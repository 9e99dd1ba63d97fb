//! Remote record lookup over HTTP.
//!
//! Binds catalog tools to an external record service: each invocation is a
//! JSON POST to `<base_url>/<tool>`. The service owns the data; this handler
//! only maps HTTP outcomes onto [`HandlerOutput`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use concierge_core::channel::ChannelContext;
use concierge_core::error::ToolError;
use concierge_core::response::Attachment;
use concierge_core::tool::{HandlerOutput, ToolHandler, ToolRecord};
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog;

const DOCUMENT_URL: &str = "document_url";
const DOCUMENT_CAPTION: &str = "document_caption";
const DOCUMENT_ID: &str = "document_id";

pub struct RemoteLookupHandler {
    tool: String,
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl RemoteLookupHandler {
    pub fn new(tool: impl Into<String>, base_url: &str, timeout_secs: u64) -> Self {
        let tool = tool.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            endpoint: format!("{}/{}", base_url.trim_end_matches('/'), tool),
            tool,
            timeout_secs,
            client,
        }
    }

    /// One handler per tool name, all pointing at the same service.
    pub fn for_tools<'a>(
        tools: impl IntoIterator<Item = &'a str>,
        base_url: &str,
        timeout_secs: u64,
    ) -> Vec<Arc<dyn ToolHandler>> {
        tools
            .into_iter()
            .map(|t| Arc::new(Self::new(t, base_url, timeout_secs)) as Arc<dyn ToolHandler>)
            .collect()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Split document fields out of the body so the link never reaches the
    /// prompt as text.
    fn record_from(&self, mut body: Value, arguments: &Value) -> ToolRecord {
        let url = take_str(&mut body, DOCUMENT_URL).filter(|u| !u.trim().is_empty());
        let caption = take_str(&mut body, DOCUMENT_CAPTION);
        let id = take_str(&mut body, DOCUMENT_ID);

        let record = ToolRecord::data(body);
        let Some(url) = url else {
            return record;
        };

        let id = id
            .or_else(|| {
                catalog::find(&self.tool)
                    .and_then(|s| s.identity_param.as_deref())
                    .and_then(|p| arguments.get(p))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();
        let caption = caption.unwrap_or_else(|| {
            if id.is_empty() {
                "Your document".to_string()
            } else {
                format!("Your document {id}")
            }
        });

        record.with_document(Attachment { url, caption, id })
    }
}

fn take_str(body: &mut Value, key: &str) -> Option<String> {
    body.as_object_mut()?
        .remove(key)?
        .as_str()
        .map(str::to_string)
}

#[async_trait]
impl ToolHandler for RemoteLookupHandler {
    fn name(&self) -> &str {
        &self.tool
    }

    async fn handle(
        &self,
        arguments: Value,
        context: &ChannelContext,
    ) -> Result<HandlerOutput, ToolError> {
        let body = serde_json::json!({
            "tool": self.tool,
            "arguments": arguments,
            "channel": context.channel,
            "phone": context.identity.phone,
            "email": context.identity.email,
        });

        debug!(tool = %self.tool, endpoint = %self.endpoint, "Remote lookup");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout {
                        tool_name: self.tool.clone(),
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ToolError::ExecutionFailed {
                        tool_name: self.tool.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(HandlerOutput::NotFound);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ToolError::ExecutionFailed {
                tool_name: self.tool.clone(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let payload: Value = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.tool.clone(),
            reason: format!("invalid JSON body: {e}"),
        })?;

        if payload.is_null() {
            return Ok(HandlerOutput::NotFound);
        }

        Ok(HandlerOutput::Found(self.record_from(payload, &arguments)))
    }
}

/// Stands in for a record service that was never configured. Every lookup
/// fails, which the dispatcher turns into an apology for the customer.
pub struct UnconfiguredLookup {
    tool: String,
}

impl UnconfiguredLookup {
    pub fn for_tools<'a>(tools: impl IntoIterator<Item = &'a str>) -> Vec<Arc<dyn ToolHandler>> {
        tools
            .into_iter()
            .map(|t| Arc::new(Self { tool: t.to_string() }) as Arc<dyn ToolHandler>)
            .collect()
    }
}

#[async_trait]
impl ToolHandler for UnconfiguredLookup {
    fn name(&self) -> &str {
        &self.tool
    }

    async fn handle(&self, _arguments: Value, _context: &ChannelContext) -> Result<HandlerOutput, ToolError> {
        warn!(tool = %self.tool, "No lookup service configured (set [lookup] base_url)");
        Err(ToolError::ExecutionFailed {
            tool_name: self.tool.clone(),
            reason: "lookup service not configured".into(),
        })
    }
}
