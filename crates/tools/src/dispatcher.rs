//! Tool dispatch: the single place a proposed invocation becomes a handler
//! call and a handler output becomes prompt-safe text.
//!
//! Per invocation:
//! 1. Resolve the handler by exact name (closed set, checked at construction)
//! 2. Normalise the identity-optional parameter and auto-fill it from the
//!    channel identity when the model left it out
//! 3. Check required parameters
//! 4. Run the handler
//! 5. Redact, summarise, and pull out the candidate attachment
//!
//! Handler failures never escape; they become tool-result text.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use concierge_core::channel::ChannelContext;
use concierge_core::error::ToolError;
use concierge_core::provider::ToolDefinition;
use concierge_core::tool::{HandlerOutput, ToolHandler, ToolInvocation, ToolResult, ToolSpec};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::redact::{self, Redactor};

/// Knobs the dispatcher takes from `[agent]` config.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub summary_max_chars: usize,
    pub redacted_fields: Vec<String>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            summary_max_chars: 1500,
            redacted_fields: [
                "cost_price",
                "unit_cost",
                "supplier_cost",
                "margin",
                "margin_pct",
                "internal_notes",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

pub struct ToolDispatcher {
    specs: Vec<ToolSpec>,
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
    redactor: Redactor,
    summary_max_chars: usize,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.names())
            .field("summary_max_chars", &self.summary_max_chars)
            .finish()
    }
}

impl ToolDispatcher {
    /// Bind handlers to a catalog.
    ///
    /// Fails with [`ToolError::CatalogMismatch`] unless every spec has exactly
    /// one handler and every handler has a spec.
    pub fn new(
        catalog: &[ToolSpec],
        handlers: Vec<Arc<dyn ToolHandler>>,
        settings: DispatchSettings,
    ) -> Result<Self, ToolError> {
        let mut bound: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        for handler in handlers {
            let name = handler.name().to_string();
            if bound.insert(name.clone(), handler).is_some() {
                return Err(ToolError::CatalogMismatch(format!(
                    "more than one handler registered for '{name}'"
                )));
            }
        }

        let spec_names: BTreeSet<&str> = catalog.iter().map(|s| s.name.as_str()).collect();
        if spec_names.len() != catalog.len() {
            return Err(ToolError::CatalogMismatch("duplicate tool names in catalog".into()));
        }

        let missing: Vec<&str> = spec_names
            .iter()
            .copied()
            .filter(|n| !bound.contains_key(*n))
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::CatalogMismatch(format!(
                "no handler for: {}",
                missing.join(", ")
            )));
        }

        let mut orphans: Vec<&str> = bound
            .keys()
            .map(String::as_str)
            .filter(|n| !spec_names.contains(n))
            .collect();
        if !orphans.is_empty() {
            orphans.sort_unstable();
            return Err(ToolError::CatalogMismatch(format!(
                "handlers without a catalog entry: {}",
                orphans.join(", ")
            )));
        }

        info!(tools = catalog.len(), "Tool dispatcher ready");

        Ok(Self {
            specs: catalog.to_vec(),
            handlers: bound,
            redactor: Redactor::new(&settings.redacted_fields),
            summary_max_chars: settings.summary_max_chars,
        })
    }

    /// Tool definitions to send to the model, in catalog order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.specs.iter().map(ToolSpec::to_definition).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Normalise the identity-optional parameter and fill it from the
    /// channel identity when absent. Non-object arguments become `{}`.
    pub fn prepare_arguments(
        &self,
        spec: &ToolSpec,
        arguments: Value,
        context: &ChannelContext,
    ) -> Value {
        let mut args = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                warn!(tool = %spec.name, arguments = %other, "Tool arguments were not an object");
                Map::new()
            }
        };

        let Some(param) = spec.identity_param.as_deref() else {
            return Value::Object(args);
        };

        let supplied = args
            .get(param)
            .and_then(value_as_identifier)
            .map(|raw| strip_prefixes(raw.trim(), &spec.identifier_prefixes))
            .filter(|v| !v.is_empty());

        match supplied {
            Some(value) => {
                args.insert(param.to_string(), Value::String(value));
            }
            None => match context.identity_value() {
                Some(identity) => {
                    debug!(
                        tool = %spec.name,
                        param,
                        channel = %context.channel,
                        "Auto-filled identifier from channel identity"
                    );
                    args.insert(param.to_string(), Value::String(identity.to_string()));
                }
                None => {
                    args.remove(param);
                }
            },
        }

        Value::Object(args)
    }

    /// Execute one invocation. Never fails; every outcome is a [`ToolResult`].
    pub async fn dispatch(&self, invocation: &ToolInvocation, context: &ChannelContext) -> ToolResult {
        let name = invocation.name.as_str();

        let (Some(spec), Some(handler)) = (self.spec(name), self.handlers.get(name)) else {
            error!(
                tool = %name,
                session_id = %context.session_id,
                known = ?self.names(),
                "Model proposed a tool outside the catalog"
            );
            return self.failure(
                invocation,
                format!("{name} result: no such tool is available. Answer without it or offer a human."),
            );
        };

        let args = self.prepare_arguments(spec, invocation.arguments.clone(), context);

        if let Some(missing) = spec
            .required
            .iter()
            .find(|p| args.get(p.as_str()).is_none_or(is_blank))
        {
            warn!(tool = %name, param = %missing, "Missing required tool argument");
            return self.failure(
                invocation,
                format!("{name} result: missing required parameter '{missing}'. Ask the customer for it."),
            );
        }

        match handler.handle(args, context).await {
            Ok(HandlerOutput::Found(record)) => {
                let mut data = record.data;
                let removed = self.redactor.redact(&mut data);
                if removed > 0 {
                    debug!(tool = %name, removed, "Redacted non-shareable fields");
                }
                ToolResult {
                    call_id: invocation.id.clone(),
                    tool_name: name.to_string(),
                    success: true,
                    summary: redact::summarize(name, &data, self.summary_max_chars),
                    document: record.document,
                }
            }
            Ok(HandlerOutput::NotFound) => {
                debug!(tool = %name, "No matching record");
                self.failure(invocation, format!("{name} result: no matching record was found"))
            }
            Err(e) => {
                warn!(tool = %name, session_id = %context.session_id, error = %e, "Tool handler failed");
                self.failure(
                    invocation,
                    format!(
                        "{name} result: the lookup failed. Apologise, and ask the customer to \
                         confirm the details or offer to connect them with a person."
                    ),
                )
            }
        }
    }

    fn failure(&self, invocation: &ToolInvocation, summary: String) -> ToolResult {
        ToolResult {
            call_id: invocation.id.clone(),
            tool_name: invocation.name.clone(),
            success: false,
            summary: redact::truncate(summary, self.summary_max_chars),
            document: None,
        }
    }
}

fn value_as_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Strip the first matching prefix, case-insensitively.
pub fn strip_prefixes(value: &str, prefixes: &[String]) -> String {
    for prefix in prefixes {
        if value.len() >= prefix.len()
            && value.is_char_boundary(prefix.len())
            && value[..prefix.len()].eq_ignore_ascii_case(prefix)
        {
            return value[prefix.len()..].trim().to_string();
        }
    }
    value.to_string()
}
