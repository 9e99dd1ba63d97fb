//! `concierge history`: print a session's stored turns.

use concierge_config::AppConfig;
use concierge_core::session::SessionId;

use crate::runtime::Runtime;

pub async fn run(session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::open(config).await?;
    let session_id = SessionId::from(session);

    let total = runtime.conversations.count(&session_id).await?;
    if total == 0 {
        println!("No stored turns for {session_id}.");
        return Ok(());
    }

    let turns = runtime.conversations.recent(&session_id, total).await?;
    println!("{session_id} ({total} turns, {} backend)", runtime.conversations.name());
    println!();
    for turn in &turns {
        println!(
            "  [{}] {:>8}: {}",
            turn.created_at.format("%Y-%m-%d %H:%M:%S"),
            turn.role,
            turn.content
        );
    }

    Ok(())
}
