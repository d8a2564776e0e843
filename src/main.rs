use anyhow::{Context, Result};
use clap::Parser;
use ecompta::cli::{Cli, Commands};
use ecompta::config::Settings;
use ecompta::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // One-shot commands stay quiet unless asked otherwise
    let level = if cli.verbose || matches!(cli.command, Commands::Serve { .. }) {
        settings.log.level.as_str()
    } else {
        "warn"
    };
    init_tracing(level, settings.log.json);

    cli.run(settings).await
}
