// Moustachar — grounded QA assistant over Moroccan labor law
// Main entry point for the moustachar binary

use clap::Parser;
use moustachar_engine::cli::{Cli, Command};
use moustachar_engine::config::Config;
use moustachar_engine::handlers::{
    handle_ask, handle_chat, handle_config, handle_history, OutputFormat,
};
use moustachar_engine::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Log level: CLI flag beats config; RUST_LOG beats both inside
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry(Some(log_level));

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Ask { question, session } => handle_ask(question, session, &config, format).await,

        Command::Chat { session } => handle_chat(session, &config).await,

        Command::History { session_id, limit } => {
            handle_history(session_id, limit, &config, format).await
        }

        Command::Config { action } => handle_config(&action, &config),
    }
}
