//! `concierge chat`: play the customer against the live orchestration loop.

use std::io::Write;
use std::sync::Arc;

use concierge_agent::{InboundMessage, InboundOutcome};
use concierge_config::AppConfig;
use concierge_core::channel::{Channel, ChannelPayload, ChatPart, CustomerIdentity};
use concierge_core::session::SessionId;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::runtime::Runtime;

pub struct ChatOptions {
    pub channel: String,
    pub from: Option<String>,
    pub name: Option<String>,
    pub session: Option<String>,
}

pub async fn run(options: ChatOptions, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    CONCIERGE_API_KEY, OPENROUTER_API_KEY, OPENAI_API_KEY");
        eprintln!();
        eprintln!("  Or add it to {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let channel: Channel = options.channel.parse()?;
    let router = concierge_providers::build_from_config(&config);
    let provider = router.default().ok_or("No default provider configured")?;
    let model = concierge_providers::resolve_model(&config);

    let runtime = Runtime::open(config).await?;
    let identity = options
        .from
        .as_deref()
        .map(|raw| runtime.adapter.identity(channel, raw))
        .unwrap_or_default();
    let session_id = session_for(channel, &identity, options.session.as_deref());
    let orchestrator = Arc::new(runtime.orchestrator(provider, model.clone())?);

    let inbound = |text: &str| {
        let mut msg = InboundMessage::new(session_id.clone(), channel, text).with_identity(identity.clone());
        if let Some(name) = &options.name {
            msg = msg.with_customer_name(name.clone());
        }
        msg
    };

    if let Some(text) = message {
        let outcome = orchestrator.handle_inbound(&inbound(&text)).await?;
        print_outcome(&outcome);
        return Ok(());
    }

    println!();
    println!("  Concierge — interactive {channel} session");
    println!("  Session:  {session_id}");
    println!("  Model:    {model}");
    println!("  Memory:   {}", runtime.memory.backend());
    println!();
    println!("  Type a message and press Enter. 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
            break;
        }
        if !text.is_empty() {
            match orchestrator.handle_inbound(&inbound(text)).await {
                Ok(outcome) => print_outcome(&outcome),
                Err(e) => eprintln!("  [Error] {e}"),
            }
        }
        prompt()?;
    }

    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  Customer > ");
    std::io::stdout().flush()
}

fn session_for(channel: Channel, identity: &CustomerIdentity, explicit: Option<&str>) -> SessionId {
    match explicit {
        Some(id) => SessionId::from(id),
        None => SessionId::qualified(channel, identity.for_channel(channel).unwrap_or("local")),
    }
}

fn print_outcome(outcome: &InboundOutcome) {
    match outcome {
        InboundOutcome::Suppressed => {
            println!("  (a human operator holds this session; the agent did not reply)");
        }
        InboundOutcome::Replied { payload, .. } => match payload {
            ChannelPayload::Chat { parts } => {
                for part in parts {
                    match part {
                        ChatPart::Text { body } => {
                            for line in body.lines() {
                                println!("  Agent > {line}");
                            }
                        }
                        ChatPart::Document { url, caption } => {
                            println!("  Agent > [document] {caption} <{url}>");
                        }
                    }
                }
            }
            ChannelPayload::Email(email) => {
                println!("  --- email body ---");
                println!("{}", email.body);
                for attachment in &email.attachments {
                    println!("  --- attachment: {} <{}>", attachment.caption, attachment.url);
                }
            }
        },
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_session_wins() {
        let identity = CustomerIdentity::phone("+15551234567");
        assert_eq!(session_for(Channel::Chat, &identity, Some("S1")).as_str(), "S1");
    }

    #[test]
    fn session_defaults_to_channel_identity() {
        let identity = CustomerIdentity::email("jane@example.com");
        let sid = session_for(Channel::Email, &identity, None);
        assert_eq!(sid, SessionId::qualified(Channel::Email, "jane@example.com"));
        let anon = session_for(Channel::Chat, &CustomerIdentity::default(), None);
        assert_eq!(anon, SessionId::qualified(Channel::Chat, "local"));
    }
}
