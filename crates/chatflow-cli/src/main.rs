use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod console;

#[derive(Parser)]
#[command(name = "chatflow")]
#[command(about = "Chatflow - scripted dialogue execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively against the built-in demo script
    Chat {
        /// Path to a TOML pipeline configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// User identifier for this console session
        #[arg(long, default_value = "console")]
        user: String,
        /// Print a JSON telemetry event per turn to stderr
        #[arg(long)]
        events: bool,
    },
    /// Structurally validate a script description file (TOML or JSON)
    Validate {
        /// Path to the script description
        #[arg(long)]
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            config,
            user,
            events,
        } => commands::chat::run(config, user, events).await?,
        Commands::Validate { script } => commands::validate::run(&script)?,
    }

    Ok(())
}
