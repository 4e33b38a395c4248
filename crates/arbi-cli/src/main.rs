use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use arbi_cli::commands::{analyze, import, runs, upload};
use arbi_cli::{Cli, Commands, Config};

/// Load config, ensuring the database directory exists.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn ensure_database_dir(config: &Config) -> Result<()> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Some(Commands::Analyze(args)) => {
            let config = load_config(cli.config.as_deref())?;
            analyze::run(&mut stdout, &config, args)?;
        }
        Some(Commands::Upload(args)) => {
            let config = load_config(cli.config.as_deref())?;
            upload::run(&mut stdout, &config, args)?;
        }
        Some(Commands::Import { file }) => {
            let config = load_config(cli.config.as_deref())?;
            ensure_database_dir(&config)?;
            import::run(&mut stdout, &config, file.as_deref())?;
        }
        Some(Commands::Runs { limit, json }) => {
            let config = load_config(cli.config.as_deref())?;
            ensure_database_dir(&config)?;
            runs::run(&mut stdout, &config, *limit, *json)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
