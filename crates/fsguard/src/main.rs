//! fsguard CLI - Filesystem operations with admission control and retries
//!
//! This is the main entry point for the fsguard command-line interface.

mod cli;
mod commands;
mod output;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fsguard::{Engine, EngineConfig};
use fsguard_core::ConfigLoader;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            output::error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command; `Ok(false)` means a clean negative answer
async fn run(cli: Cli) -> Result<bool> {
    let loader = ConfigLoader::new();
    let config = load_config(&loader, &cli)?;
    tracing::debug!(
        capacity = config.capacity,
        max_attempts = config.max_attempts,
        base_delay_ms = config.base_delay_ms,
        "engine configured"
    );

    let engine = Engine::new(config.clone())?;

    match cli.command {
        Commands::Read(args) => commands::fs::read(&engine, args).await?,
        Commands::Write(args) => commands::fs::write(&engine, args).await?,
        Commands::Mkdir(args) => commands::fs::mkdir(&engine, args).await?,
        Commands::Remove(args) => commands::fs::remove(&engine, args).await?,
        Commands::Copy(args) => commands::fs::copy(&engine, args).await?,
        Commands::Move(args) => commands::fs::move_path(&engine, args).await?,
        Commands::Exists(args) => return commands::fs::exists(&engine, args).await,
        Commands::EnsureFile(args) => commands::fs::ensure_file(&engine, args).await?,
        Commands::Config(cmd) => commands::config::run(cmd, &loader, &config)?,
    }

    Ok(true)
}

/// Resolve configuration: file and env via the loader, then CLI flags
fn load_config(loader: &ConfigLoader, cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => loader
            .load_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => loader.load().context("Failed to load config")?,
    };

    if let Some(capacity) = cli.capacity {
        config.capacity = capacity;
    }
    config.validate()?;

    Ok(config)
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
