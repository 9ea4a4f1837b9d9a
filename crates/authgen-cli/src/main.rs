mod cli;
mod commands;
mod observability;
mod output;

use anyhow::{Context, Result};
use authgen_config::load_settings;
use clap::Parser;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    observability::init_tracing(level);
    tracing::debug!(config = ?cli.config, level, "Settings loaded");

    match &cli.command {
        Commands::Compile(args) => commands::compile::compile(&settings, args).await?,
        Commands::Resolve(args) => commands::resolve::resolve(&settings, &args.uri).await?,
        Commands::Config(args) => match &args.command {
            ConfigCommands::Show => commands::config::show(&settings)?,
        },
    }

    Ok(())
}
