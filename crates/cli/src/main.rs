//! Concierge CLI: the process entry point.
//!
//! Commands:
//! - `init`     Write a default config file
//! - `chat`     Talk to the agent as a customer (interactive or single message)
//! - `control`  Show, take or release human control of a session
//! - `history`  Print the stored turns of a session
//! - `catalog`  List the tools the model can call
//! - `doctor`   Diagnose configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "concierge",
    about = "Concierge — customer-service conversation orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.concierge/config.toml with defaults
    Init,

    /// Chat with the agent as a customer
    Chat {
        /// Channel the conversation happens on (chat or email)
        #[arg(short, long, default_value = "chat")]
        channel: String,

        /// Raw sender address (phone number, `whatsapp:+1...`, or `Name <email>`)
        #[arg(short, long)]
        from: Option<String>,

        /// Customer display name
        #[arg(short, long)]
        name: Option<String>,

        /// Session id (defaults to `<channel>:<identity>`)
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show or change human control of a session
    Control {
        /// Session id
        session: String,

        /// `on` to take over, `off` to hand back; omit to show the current state
        #[arg(value_parser = ["on", "off"])]
        state: Option<String>,
    },

    /// Print the stored conversation for a session
    History {
        /// Session id
        session: String,
    },

    /// List the tool catalog
    Catalog,

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Chat {
            channel,
            from,
            name,
            session,
            message,
        } => {
            let options = commands::chat::ChatOptions {
                channel,
                from,
                name,
                session,
            };
            commands::chat::run(options, message).await?
        }
        Commands::Control { session, state } => {
            commands::control::run(&session, state.as_deref()).await?
        }
        Commands::History { session } => commands::history::run(&session).await?,
        Commands::Catalog => commands::catalog::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
