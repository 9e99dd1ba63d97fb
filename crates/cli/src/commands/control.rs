//! `concierge control`: operator takeover and hand-back.

use concierge_config::AppConfig;
use concierge_core::session::SessionId;

use crate::runtime::Runtime;

pub async fn run(session: &str, state: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::open(config).await?;
    let session_id = SessionId::from(session);

    match state {
        Some(state) => {
            let human = state == "on";
            let updated = runtime.gate.set_human_control(&session_id, human).await?;
            if human {
                println!("Human operator now holds {session_id}; the agent will stay silent.");
            } else {
                println!("{session_id} handed back to the agent.");
            }
            println!("  updated_at: {}", updated.updated_at.to_rfc3339());
        }
        None => {
            let human = runtime.gate.is_human_in_control(&session_id).await;
            let holder = if human { "human operator" } else { "agent" };
            println!("{session_id}: {holder}");
        }
    }

    Ok(())
}
