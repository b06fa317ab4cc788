// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "reimage")]
#[command(about = "Replace containers with ones built from the newest version of their image")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (default: reimage.yml in the working directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new reimage.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Pull an image and replace every container created from its old version
    Update {
        /// Image reference, e.g. nginx:latest
        image: String,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Show which containers an update would replace, without pulling
    Plan {
        /// Image reference, e.g. nginx:latest
        image: String,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Overrides for the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// Engine control socket
    #[arg(long)]
    pub socket: Option<String>,

    /// Retries per engine call
    #[arg(long)]
    pub retries: Option<u32>,

    /// Pause between retries, e.g. 500ms or 2s
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    pub retry_delay: Option<Duration>,
}
