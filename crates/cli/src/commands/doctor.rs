//! `concierge doctor`: diagnose configuration and connectivity.

use concierge_config::AppConfig;

use crate::runtime::Runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Concierge Doctor");
    println!("================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file, using defaults (run `concierge init`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            return Ok(());
        }
    };

    if config.has_api_key() || config.providers.values().any(|p| p.api_key.is_some()) {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key configured");
        issues += 1;
    }

    let router = concierge_providers::build_from_config(&config);
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  [ok]   Provider '{}' reachable", provider.name()),
            Ok(false) => {
                println!("  [warn] Provider '{}' answered with an error", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  [fail] Provider '{}' unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  [fail] No default provider");
            issues += 1;
        }
    }

    if config.lookup.base_url.is_some() {
        println!("  [ok]   Lookup service configured");
    } else {
        println!("  [warn] No [lookup] base_url; record lookups will fail");
        issues += 1;
    }

    if config.escalation.webhook_url.is_some() {
        println!("  [ok]   Escalation webhook configured");
    } else {
        println!("  [warn] No escalation webhook; escalations are only logged");
        issues += 1;
    }

    match Runtime::open(config).await {
        Ok(runtime) => {
            println!("  [ok]   Conversation store '{}' open", runtime.memory.backend());
            match runtime.dispatcher() {
                Ok(d) => println!("  [ok]   {} tools bound", d.names().len()),
                Err(e) => {
                    println!("  [fail] Tool binding: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  [fail] Could not open stores: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
