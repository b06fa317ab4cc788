// ABOUTME: Entry point for the reimage CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, EngineArgs};
use reimage::config::{self, Config, EnvValue};
use reimage::error::Result;
use reimage::output::{Output, OutputMode};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let default_filter = if cli.verbose {
        "debug"
    } else {
        "reimage=info,warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);
    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Update { image, engine } => {
            let config = load_config(cli.config.as_deref(), &engine)?;
            commands::update(config, &image, output).await
        }
        Commands::Plan { image, engine } => {
            let config = load_config(cli.config.as_deref(), &engine)?;
            commands::plan(config, &image, output).await
        }
    }
}

/// Load the explicit config file, or discover one in the working directory,
/// then apply command-line overrides.
fn load_config(path: Option<&Path>, args: &EngineArgs) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::discover_or_default(&env::current_dir()?)?,
    };

    if let Some(socket) = &args.socket {
        config.socket = Some(EnvValue::Literal(socket.clone()));
    }
    if let Some(retries) = args.retries {
        config.retry.retries = retries;
    }
    if let Some(delay) = args.retry_delay {
        config.retry.delay = delay;
    }

    Ok(config)
}
