//! Configuration management CLI commands.
//!
//! Provides `config path` and `config show`.

use std::path::PathBuf;

use clap::Subcommand;
use trackhub::settings::Settings;

use super::config_path;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the effective settings (file values over defaults)
    Show {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path { config } => {
            println!("{}", config_path(config)?.display());
            Ok(())
        }
        ConfigCommands::Show { config } => run_show(config),
    }
}

fn run_show(config: Option<PathBuf>) -> Result<(), CliError> {
    let path = config_path(config)?;
    let settings = Settings::load(&path)?;
    let server = &settings.server;

    println!("Configuration Settings ({})", path.display());
    println!("======================");
    println!();
    println!("[server]");
    println!("  host = {}", server.host);
    println!("  port = {}", server.port);
    println!("  max_workers = {}", server.max_workers);
    println!("  max_sessions = {}", server.max_sessions);
    println!("  max_body_bytes = {}", server.max_body_bytes);
    println!();
    println!("[logging]");
    match &settings.logging.directory {
        Some(dir) => println!("  directory = {}", dir.display()),
        None => println!("  directory = (not set)"),
    }
    println!("  filter = {}", settings.logging.filter);
    Ok(())
}
