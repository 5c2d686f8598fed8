//! Command-line entry point for the Servarr stack setup tool

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "servarr-setup")]
#[command(about = "Declarative setup for a seedbox-hosted Servarr media stack")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config/config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the selected services against the declared configuration
    Apply {
        /// Comma-separated service names, or `all`
        #[arg(long, default_value = "all")]
        services: String,

        /// Log mutations instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that the selected services are reachable
    Validate {
        /// Comma-separated service names, or `all`
        #[arg(long, default_value = "all")]
        services: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Apply { services, dry_run } => {
            commands::apply::run(&cli.config, &services, dry_run).await?
        }
        Commands::Validate { services } => commands::validate::run(&cli.config, &services).await?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
