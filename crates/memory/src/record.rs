//! Stored-turn normaliser.
//!
//! Durable turn records are not owned by this crate. Depending on which
//! writer produced them they may say `role`/`sender`/`from`/`author`,
//! `content`/`message`/`text`/`body`, and so on. Every store reads raw JSON
//! and funnels it through [`normalize`] once, so the rest of the system only
//! ever sees [`Turn`].

use chrono::{DateTime, TimeZone, Utc};
use concierge_core::session::{Turn, TurnRole};
use serde_json::Value;

const ROLE_KEYS: &[&str] = &["role", "sender", "from", "author", "direction"];
const CONTENT_KEYS: &[&str] = &["content", "message", "text", "body"];
const TIMESTAMP_KEYS: &[&str] = &["created_at", "createdAt", "timestamp", "sent_at", "sentAt"];

/// Map a stored role label onto a [`TurnRole`].
pub fn parse_role(raw: &str) -> Option<TurnRole> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "customer" | "user" | "client" | "inbound" | "human" => Some(TurnRole::Customer),
        "agent" | "assistant" | "bot" | "ai" | "outbound" | "operator" => Some(TurnRole::Agent),
        _ => None,
    }
}

/// Normalise one stored record. Returns `None` for records with no usable
/// role or content.
pub fn normalize(record: &Value) -> Option<Turn> {
    let object = record.as_object()?;

    let role = ROLE_KEYS
        .iter()
        .filter_map(|k| object.get(*k))
        .find_map(|v| v.as_str().and_then(parse_role))?;

    let content = CONTENT_KEYS
        .iter()
        .filter_map(|k| object.get(*k))
        .find_map(|v| v.as_str())?
        .to_string();

    let created_at = TIMESTAMP_KEYS
        .iter()
        .filter_map(|k| object.get(*k))
        .find_map(parse_timestamp)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    Some(Turn {
        role,
        content,
        created_at,
    })
}

/// RFC 3339 strings, or integer epoch seconds/milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Anything past year 2286 in seconds is really milliseconds
            if raw > 9_999_999_999 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

/// The canonical shape every store in this crate writes.
pub fn encode(turn: &Turn) -> Value {
    serde_json::json!({
        "role": turn.role.as_str(),
        "content": turn.content,
        "created_at": turn.created_at.to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_shape_roundtrips() {
        let turn = Turn::new(TurnRole::Customer, "Where is my order?");
        let back = normalize(&encode(&turn)).unwrap();
        assert_eq!(back.role, TurnRole::Customer);
        assert_eq!(back.content, "Where is my order?");
        assert_eq!(back.created_at.timestamp(), turn.created_at.timestamp());
    }

    #[test]
    fn alternate_field_names() {
        let turn = normalize(&json!({
            "sender": "assistant",
            "message": "It ships tomorrow",
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(turn.role, TurnRole::Agent);
        assert_eq!(turn.content, "It ships tomorrow");
        assert_eq!(turn.created_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn epoch_timestamps() {
        let secs = normalize(&json!({"from": "user", "text": "hi", "timestamp": 1_700_000_000})).unwrap();
        let millis =
            normalize(&json!({"from": "user", "text": "hi", "timestamp": 1_700_000_000_000_i64})).unwrap();
        assert_eq!(secs.created_at, millis.created_at);
    }

    #[test]
    fn unknown_role_or_missing_content_is_dropped() {
        assert!(normalize(&json!({"role": "system", "content": "x"})).is_none());
        assert!(normalize(&json!({"role": "user"})).is_none());
        assert!(normalize(&json!("just a string")).is_none());
    }

    #[test]
    fn missing_timestamp_sorts_first() {
        let turn = normalize(&json!({"author": "bot", "body": "hello"})).unwrap();
        assert_eq!(turn.created_at, DateTime::<Utc>::MIN_UTC);
    }
}
