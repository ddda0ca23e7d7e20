//! perfkit - Main Entry Point

use clap::Parser;
use perfkit::cli::{cmd_bench, cmd_info, cmd_settings, load_settings, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perfkit=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => cmd_info(settings)?,
        Commands::Settings { json } => cmd_settings(settings, json)?,
        Commands::Bench { entries, value_bytes, budget_kb } => {
            cmd_bench(settings, entries, value_bytes, budget_kb)?;
        }
    }

    Ok(())
}
