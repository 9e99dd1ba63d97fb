//! Non-shareable field removal and bounded summaries.
//!
//! Anything placed into the prompt is visible to the model and can leak into
//! its output, so deny-listed fields are stripped here, once, before a
//! summary is ever built.

use std::collections::HashSet;

use serde_json::Value;

/// Marker appended to summaries that were cut short.
pub const ELLIPSIS: char = '…';

/// Removes deny-listed keys at any depth. Matching is case-insensitive.
#[derive(Debug, Clone)]
pub struct Redactor {
    denied: HashSet<String>,
}

impl Redactor {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denied: fields
                .into_iter()
                .map(|f| f.as_ref().trim().to_ascii_lowercase())
                .filter(|f| !f.is_empty())
                .collect(),
        }
    }

    pub fn is_denied(&self, key: &str) -> bool {
        self.denied.contains(&key.to_ascii_lowercase())
    }

    /// Strip denied keys in place. Returns how many were removed.
    pub fn redact(&self, value: &mut Value) -> usize {
        match value {
            Value::Object(map) => {
                let before = map.len();
                map.retain(|k, _| !self.is_denied(k));
                let mut removed = before - map.len();
                for child in map.values_mut() {
                    removed += self.redact(child);
                }
                removed
            }
            Value::Array(items) => items.iter_mut().map(|v| self.redact(v)).sum(),
            _ => 0,
        }
    }
}

/// `"<tool> result: <compact json>"`, cut to at most `max_chars` characters.
pub fn summarize(tool: &str, data: &Value, max_chars: usize) -> String {
    truncate(format!("{tool} result: {data}"), max_chars)
}

/// Cut on a char boundary so the result, ellipsis included, fits `max_chars`.
pub fn truncate(text: String, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text;
    }
    let keep = max_chars.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push(ELLIPSIS);
    out
}
