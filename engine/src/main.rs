// Haven advisor
// Main entry point for the haven binary

use clap::Parser;
use haven_engine::cli::{Cli, Command};
use haven_engine::config::Config;
use haven_engine::handlers::{
    handle_ask, handle_chat, handle_saved, handle_usage, load_profile, OutputFormat,
};
use haven_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!(
        "Haven v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Handle commands
    match cli.command {
        Command::Chat { name, profile } => {
            let profile = load_profile(profile.as_deref(), name).await?;
            handle_chat(&config, profile, format).await
        }

        Command::Ask { text, profile } => {
            let profile = load_profile(profile.as_deref(), None).await?;
            handle_ask(text, profile, format).await
        }

        Command::Usage => handle_usage(&config, format).await,

        Command::Saved { limit } => {
            tracing::info!("Showing last {} saved conversations", limit);
            handle_saved(limit, &config, format).await
        }
    }
}
