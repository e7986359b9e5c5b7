//! RasCAL-2 CLI
//!
//! Command-line interface for creating, importing and inspecting projects.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rascal2::cli::{commands, Cli, Commands};
use rascal2::config::AppConfig;
use rascal2::state::session::open_failure_message;

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("RasCAL-2 v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(cli.config.as_deref()).context("could not load configuration")?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("RasCAL-2 v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn opened(path: &Path, result: rascal2::Result<()>) -> anyhow::Result<()> {
    result.map_err(|e| anyhow::anyhow!(open_failure_message(path, &e)))
}

fn handle_command(cmd: Commands, config: &AppConfig) -> anyhow::Result<ExitCode> {
    match cmd {
        Commands::Create { path, name } => {
            commands::create(&path, name.as_deref())
                .with_context(|| format!("could not create project in {}", path.display()))?;
        }
        Commands::Import { ort, folder } => {
            commands::import(&ort, &folder, config)
                .with_context(|| format!("could not import {}", ort.display()))?;
        }
        Commands::Show { path } => opened(&path, commands::show(&path, config))?,
        Commands::Check { path } => {
            let consistent = commands::check(&path, config)
                .map_err(|e| anyhow::anyhow!(open_failure_message(&path, &e)))?;
            if !consistent {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
