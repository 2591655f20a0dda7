//! readthrough - versioned read-through HTTP response cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use readthrough::cli::{Cli, Commands};
use readthrough::config::{Config, ConfigManager};
use readthrough::error::ReadThroughResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn, 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("readthrough=warn"),
        1 => EnvFilter::new("readthrough=info"),
        _ => EnvFilter::new("readthrough=debug"),
    };

    if config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
}

async fn run() -> ReadThroughResult<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::locate(cli.config.clone());
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Loaded configuration from {}", config_manager.path().display());

    match cli.command {
        Commands::Install => readthrough::cli::commands::install(&config).await,
        Commands::Activate => readthrough::cli::commands::activate(&config).await,
        Commands::Up(args) => readthrough::cli::commands::up(args, &config).await,
        Commands::Fetch(args) => readthrough::cli::commands::fetch(args, &config).await,
        Commands::Caches(args) => readthrough::cli::commands::caches(args, &config).await,
        Commands::Config(args) => {
            readthrough::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
