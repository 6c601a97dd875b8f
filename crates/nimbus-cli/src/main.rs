//! Nimbus CLI - Command-line interface for Nimbus
//!
//! Provides commands for:
//! - Listing containers and inspecting items
//! - Fetching content on demand and evicting it again
//! - Pushing local modifications and importing new files
//! - Viewing and validating the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nimbus_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod session;

use commands::{
    config::ConfigCommand,
    items::{InfoCommand, LsCommand},
    transfers::{EvictCommand, FetchCommand, ImportCommand, PushCommand},
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "nimbus", version, about = "On-demand WebDAV file provider")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the items of a container
    Ls(LsCommand),
    /// Show the state of one item
    Info(InfoCommand),
    /// Download the content of an item and wait for it
    Fetch(FetchCommand),
    /// Upload the locally modified content at a path
    Push(PushCommand),
    /// Drop the local content at a path
    Evict(EvictCommand),
    /// Add a local file to a container and upload it
    Import(ImportCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Everything a command needs besides its own arguments
pub struct Invocation {
    pub format: OutputFormat,
    pub config_path: PathBuf,
    pub config: Config,
}

/// Filter used when `RUST_LOG` is not set
fn default_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    let filter = default_filter(cli.verbose, &config.logging.level);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let invocation = Invocation {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        config_path,
        config,
    };

    match cli.command {
        Commands::Ls(cmd) => cmd.execute(&invocation).await,
        Commands::Info(cmd) => cmd.execute(&invocation).await,
        Commands::Fetch(cmd) => cmd.execute(&invocation).await,
        Commands::Push(cmd) => cmd.execute(&invocation).await,
        Commands::Evict(cmd) => cmd.execute(&invocation).await,
        Commands::Import(cmd) => cmd.execute(&invocation).await,
        Commands::Config(cmd) => cmd.execute(&invocation).await,
    }
}
