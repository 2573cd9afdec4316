//! ClipShelf - clipboard history service
//!
//! This is the main entry point for the ClipShelf server and CLI.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipshelf::cli::{Cli, CliHandler};
use clipshelf::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_config(cli.config.clone())?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("clipshelf={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("ClipShelf v{}", env!("CARGO_PKG_VERSION"));

    let mut handler = CliHandler::new(config, cli.config);
    handler.handle_command(cli.command).await?;

    Ok(())
}
