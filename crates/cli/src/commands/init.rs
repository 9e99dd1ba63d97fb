//! `concierge init`: write a default config file.

use concierge_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or delete it and re-run `concierge init`.");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("Created {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Add your API key (or export OPENROUTER_API_KEY)");
    println!("  2. Point [lookup] base_url at your record service");
    println!("  3. Run: concierge chat --from +15551234567");

    Ok(())
}
