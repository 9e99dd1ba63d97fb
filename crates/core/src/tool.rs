//! Tool types and the `ToolHandler` trait.
//!
//! A tool is a named external capability the model may request
//! mid-conversation (order, quote and invoice lookups, knowledge-base search,
//! escalation). Specifications are static and channel-independent; handlers
//! are the I/O-bound implementations bound to them at start-up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelContext;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::response::Attachment;

/// An immutable tool specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name.
    pub name: String,

    /// What the tool does (sent to the model).
    pub description: String,

    /// JSON Schema `properties` object for the tool's parameters.
    pub parameters: serde_json::Value,

    /// Names of required parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    /// Optional identifying parameter that the dispatcher fills from the
    /// channel identity when the model omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_param: Option<String>,

    /// Prefixes stripped (case-insensitively) from the identifying parameter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier_prefixes: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({}),
            required: Vec::new(),
            identity_param: None,
            identifier_prefixes: Vec::new(),
        }
    }

    /// Add a string parameter.
    pub fn param(mut self, name: &str, description: &str, required: bool) -> Self {
        if let Some(props) = self.parameters.as_object_mut() {
            props.insert(
                name.to_string(),
                serde_json::json!({ "type": "string", "description": description }),
            );
        }
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Mark `param` as identity-optional, stripping `prefixes` before use.
    pub fn identity_optional(mut self, param: &str, prefixes: &[&str]) -> Self {
        self.identity_param = Some(param.to_string());
        self.identifier_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Full JSON Schema for the parameters.
    pub fn parameter_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": self.parameters,
            "required": self.required,
        })
    }

    /// Convert this spec into a ToolDefinition for sending to the LLM.
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameter_schema(),
        }
    }
}

/// A tool call proposed by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// A record located by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Raw structured result. May contain non-shareable fields; the
    /// dispatcher redacts before anything reaches the prompt.
    pub data: serde_json::Value,

    /// Deliverable document this record resolves to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Attachment>,
}

impl ToolRecord {
    pub fn data(data: serde_json::Value) -> Self {
        Self { data, document: None }
    }

    pub fn with_document(mut self, document: Attachment) -> Self {
        self.document = Some(document);
        self
    }
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HandlerOutput {
    Found(ToolRecord),
    NotFound,
}

/// The outcome of dispatching one invocation, ready for re-injection.
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Name of the tool that ran
    pub tool_name: String,

    /// Whether a record was found
    pub success: bool,

    /// Bounded, redacted text summary safe to place in the prompt
    pub summary: String,

    /// Candidate side-channel attachment
    pub document: Option<Attachment>,
}

/// One handler per tool specification.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The name of the tool this handler serves.
    fn name(&self) -> &str;

    /// Execute with the (already normalised) arguments.
    async fn handle(
        &self,
        arguments: serde_json::Value,
        context: &ChannelContext,
    ) -> std::result::Result<HandlerOutput, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builds_schema() {
        let spec = ToolSpec::new("get_invoice", "Look up an invoice")
            .param("invoice_number", "Invoice number", false)
            .identity_optional("invoice_number", &["INV-"]);

        let schema = spec.parameter_schema();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["invoice_number"].is_object());
        assert_eq!(schema["required"], serde_json::json!([]));
        assert_eq!(spec.identity_param.as_deref(), Some("invoice_number"));
    }

    #[test]
    fn required_params_are_listed() {
        let spec = ToolSpec::new("search_knowledge_base", "Search")
            .param("query", "What to search for", true);
        assert_eq!(spec.to_definition().parameters["required"], serde_json::json!(["query"]));
    }

    #[test]
    fn handler_output_tags_status() {
        let json = serde_json::to_string(&HandlerOutput::NotFound).unwrap();
        assert!(json.contains("not_found"));
    }
}
