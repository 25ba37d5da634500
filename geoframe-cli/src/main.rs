//! geoframe CLI - Command-line interface
//!
//! Inspects geo-positions of local points and simulates viewport edits
//! against an in-memory terrain scene.

mod commands;
mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use geoframe::config::ConfigFile;
use geoframe::logging::{init_console_logging, init_from_settings, LoggingGuard};

use commands::config::ConfigCommands;
use commands::inspect::InspectArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "geoframe")]
#[command(about = "Keep terrain viewports in sync with their geo-location", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.geoframe/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to the configured log file
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show latitude/longitude, UTM and height of a local point
    Inspect(InspectArgs),

    /// Apply a move, rotate or resize to the demo viewport and synchronize
    Simulate(SimulateArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
        Commands::Inspect(args) => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = init_logging(&config, cli.log_file)?;
            commands::inspect::run(args, &config)
        }
        Commands::Simulate(args) => {
            let config = load_config(cli.config.as_deref())?;
            let _guard = init_logging(&config, cli.log_file)?;
            commands::simulate::run(args, &config)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

fn init_logging(config: &ConfigFile, to_file: bool) -> Result<Option<LoggingGuard>, CliError> {
    if to_file {
        let guard = init_from_settings(&config.logging).map_err(CliError::LoggingInit)?;
        return Ok(Some(guard));
    }
    init_console_logging(&config.logging.level);
    Ok(None)
}
