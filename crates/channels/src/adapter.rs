//! The default channel adapter.
//!
//! Chat is phone-addressed and delivers text and documents as separate
//! transport calls. Email arrives inside a template that supplies its own
//! greeting and signature, so those are stripped from the model's text.
//! Rendering never adds or drops attachments and never rewrites the body
//! beyond removing that envelope.

use concierge_config::{ChannelSettings, ChannelsConfig};
use concierge_core::channel::{
    Channel, ChannelAdapter, ChannelPayload, ChatPart, CustomerIdentity, EmailPayload,
};
use concierge_core::response::AgentResponse;

const GREETINGS: &[&str] = &[
    "hi",
    "hello",
    "hey",
    "dear",
    "good morning",
    "good afternoon",
    "good evening",
    "greetings",
];

const SIGN_OFFS: &[&str] = &[
    "best regards",
    "kind regards",
    "warm regards",
    "regards",
    "best",
    "best wishes",
    "all the best",
    "many thanks",
    "thanks",
    "thank you",
    "sincerely",
    "yours sincerely",
    "cheers",
];

/// Lines after a sign-off that are still treated as the signature block.
const MAX_SIGNATURE_LINES: usize = 3;

const TRANSPORT_PREFIXES: &[&str] = &["whatsapp:", "sms:", "tel:", "mailto:"];

pub struct DefaultChannelAdapter {
    config: ChannelsConfig,
}

impl DefaultChannelAdapter {
    pub fn new(config: ChannelsConfig) -> Self {
        Self { config }
    }

    fn settings(&self, channel: Channel) -> &ChannelSettings {
        match channel {
            Channel::Chat => &self.config.chat,
            Channel::Email => &self.config.email,
        }
    }
}

impl Default for DefaultChannelAdapter {
    fn default() -> Self {
        Self::new(ChannelsConfig::default())
    }
}

impl ChannelAdapter for DefaultChannelAdapter {
    fn system_prompt(&self, channel: Channel) -> String {
        let settings = self.settings(channel);
        if let Some(custom) = &settings.system_prompt_override {
            return custom.clone();
        }

        let business = &settings.business_name;
        let shared = format!(
            "You are the customer service assistant for {business}. Use the tools to look up \
             orders, quotes and invoices instead of guessing. If the customer does not give a \
             number, call the tool without it; their account is identified automatically. \
             Never invent prices, dates or statuses. Never paste document links into your \
             reply; documents are delivered separately. If a lookup fails or finds nothing, \
             say so and offer to connect them with a person. Use escalate_to_human when they \
             ask for a person or you cannot help."
        );

        match channel {
            Channel::Chat => format!(
                "{shared}\n\nThis is a chat conversation. Keep replies short and friendly: one \
                 to three sentences, plain text, no markdown headings."
            ),
            Channel::Email => format!(
                "{shared}\n\nThis is an email conversation. Write complete, well structured \
                 paragraphs. Do not add a greeting line or a signature; the email template \
                 adds both."
            ),
        }
    }

    fn identity(&self, channel: Channel, raw_address: &str) -> CustomerIdentity {
        let mut raw = raw_address.trim();
        for prefix in TRANSPORT_PREFIXES {
            if raw.get(..prefix.len()).is_some_and(|p| p.eq_ignore_ascii_case(prefix)) {
                raw = raw[prefix.len()..].trim();
                break;
            }
        }

        if let Some(email) = parse_email(raw) {
            return CustomerIdentity::email(email);
        }
        if let Some(phone) = parse_phone(raw) {
            return CustomerIdentity::phone(phone);
        }

        tracing::debug!(channel = %channel, "Could not extract an identity from the address");
        CustomerIdentity::default()
    }

    fn render(&self, channel: Channel, response: &AgentResponse) -> ChannelPayload {
        match channel {
            Channel::Chat => {
                let mut parts = Vec::with_capacity(1 + response.attachments.len());
                parts.push(ChatPart::Text {
                    body: response.text.clone(),
                });
                parts.extend(response.attachments.iter().map(|a| ChatPart::Document {
                    url: a.url.clone(),
                    caption: a.caption.clone(),
                }));
                ChannelPayload::Chat { parts }
            }
            Channel::Email => {
                let body = if self.config.email.strip_envelope {
                    strip_envelope(&response.text)
                } else {
                    response.text.trim().to_string()
                };
                ChannelPayload::Email(EmailPayload {
                    body,
                    attachments: response.attachments.clone(),
                })
            }
        }
    }
}

/// `Jane Doe <jane@example.com>` or a bare address, lowercased.
fn parse_email(raw: &str) -> Option<String> {
    let candidate = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(open), Some(close)) if open < close => &raw[open + 1..close],
        _ => raw,
    };
    let candidate = candidate.trim().trim_matches('"');
    let (local, domain) = candidate.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || candidate.contains(char::is_whitespace) {
        return None;
    }
    Some(candidate.to_ascii_lowercase())
}

/// Digits with an optional leading `+`; separators are dropped.
fn parse_phone(raw: &str) -> Option<String> {
    let plus = raw.starts_with('+');
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let only_separators = raw
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')' | '.'));
    if digits.len() < 6 || !only_separators {
        return None;
    }
    Some(if plus { format!("+{digits}") } else { digits })
}

fn normalized_line(line: &str) -> String {
    line.trim()
        .trim_end_matches([',', '.', '!', ':'])
        .trim()
        .to_ascii_lowercase()
}

fn is_greeting(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 60 {
        return false;
    }
    let lower = normalized_line(trimmed);
    let words = lower.split_whitespace().count();
    // "Hi Jane," / "Dear Mr. Smith," / "Hello!" but not "Hi, your order shipped!"
    let shaped = (trimmed.ends_with(',') && words <= 5) || words <= 3;
    shaped
        && GREETINGS.iter().any(|g| {
            lower == *g
                || lower
                    .strip_prefix(g)
                    .is_some_and(|rest| rest.starts_with(' ') || rest.starts_with(','))
        })
}

fn is_sign_off(line: &str) -> bool {
    let lower = normalized_line(line);
    SIGN_OFFS.contains(&lower.as_str())
}

/// A name or title under a sign-off: short, no digits or amounts, not a sentence.
fn is_signature_line(line: &str) -> bool {
    let trimmed = line.trim();
    let words = trimmed.split_whitespace().count();
    trimmed.chars().count() <= 40
        && words <= 5
        && !trimmed.chars().any(|c| c.is_ascii_digit() || "$€£%?!:;".contains(c))
        && !(trimmed.ends_with('.') && words > 3)
}

/// Remove a leading greeting line and a trailing sign-off block. A sign-off
/// only counts when nothing but signature lines follow it.
/// Returns the trimmed original if stripping would leave nothing.
pub fn strip_envelope(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();

    let mut start = lines.iter().position(|l| !l.trim().is_empty()).unwrap_or(0);
    if lines.get(start).is_some_and(|l| is_greeting(l)) {
        start += 1;
    }

    let mut end = lines.len();
    let last_content = lines.iter().rposition(|l| !l.trim().is_empty());
    if let Some(last) = last_content {
        let window_start = last.saturating_sub(MAX_SIGNATURE_LINES);
        let sign_off = (window_start..=last).find(|&i| {
            i >= start
                && is_sign_off(lines[i])
                && lines[i + 1..=last]
                    .iter()
                    .filter(|l| !l.trim().is_empty())
                    .all(|l| is_signature_line(l))
        });
        if let Some(sign_off) = sign_off {
            end = sign_off;
        }
    }

    let body = lines[start.min(end)..end].join("\n").trim().to_string();
    if body.is_empty() {
        text.trim().to_string()
    } else {
        body
    }
}
