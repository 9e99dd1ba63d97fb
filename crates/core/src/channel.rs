//! Channel types and the `ChannelAdapter` trait: the presentation boundary.
//!
//! A channel is the messaging surface a conversation happens on. The adapter
//! supplies the per-channel system prompt, extracts the customer identity from
//! the raw transport address, and renders a finished [`AgentResponse`] into a
//! transport payload. Rendering is a pure presentation transform; it never
//! changes what the orchestration loop decided to say or send.

use serde::{Deserialize, Serialize};

use crate::response::{AgentResponse, Attachment};
use crate::session::SessionId;

/// The messaging surface a conversation occurs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Real-time chat (phone-addressed messaging).
    Chat,
    /// Email.
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" | "whatsapp" | "sms" => Ok(Self::Chat),
            "email" | "mail" => Ok(Self::Email),
            other => Err(format!("unknown channel '{other}' (expected 'chat' or 'email')")),
        }
    }
}

/// Customer identity known from the channel itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl CustomerIdentity {
    pub fn phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            email: None,
        }
    }

    pub fn email(email: impl Into<String>) -> Self {
        Self {
            phone: None,
            email: Some(email.into()),
        }
    }

    /// The identifier that best represents the customer on `channel`:
    /// phone for chat, email for email, falling back to whichever is known.
    pub fn for_channel(&self, channel: Channel) -> Option<&str> {
        let (primary, secondary) = match channel {
            Channel::Chat => (&self.phone, &self.email),
            Channel::Email => (&self.email, &self.phone),
        };
        primary
            .as_deref()
            .or(secondary.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none()
    }
}

/// Per-message context handed to every tool handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelContext {
    pub session_id: SessionId,
    pub channel: Channel,
    pub identity: CustomerIdentity,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    /// The customer's original message text, unmodified.
    pub original_text: String,
}

impl ChannelContext {
    /// The channel identity used for identifier auto-fill.
    pub fn identity_value(&self) -> Option<&str> {
        self.identity.for_channel(self.channel)
    }
}

/// One transport call on the chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatPart {
    Text { body: String },
    Document { url: String, caption: String },
}

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPayload {
    pub body: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// A channel-specific payload ready for the outbound transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
pub enum ChannelPayload {
    Chat { parts: Vec<ChatPart> },
    Email(EmailPayload),
}

impl ChannelPayload {
    /// Number of outbound transport calls this payload needs.
    pub fn transport_calls(&self) -> usize {
        match self {
            Self::Chat { parts } => parts.len(),
            Self::Email(_) => 1,
        }
    }
}

/// The presentation boundary for a channel.
pub trait ChannelAdapter: Send + Sync {
    /// The system prompt seeded at the top of every completion request.
    fn system_prompt(&self, channel: Channel) -> String;

    /// Extract the customer identity from a raw transport address
    /// (`whatsapp:+1555...`, `Jane Doe <jane@example.com>`, ...).
    fn identity(&self, channel: Channel, raw_address: &str) -> CustomerIdentity;

    /// Render a finished response for the outbound transport.
    fn render(&self, channel: Channel, response: &AgentResponse) -> ChannelPayload;
}
