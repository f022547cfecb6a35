//! TrackHub CLI - Command-line interface
//!
//! Runs the tracking service and manages its configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::serve::ServeArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "trackhub")]
#[command(version = trackhub::VERSION)]
#[command(about = "Multi-session object tracking service over HTTP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking service
    Serve {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(long)]
        port: Option<u16>,

        /// Number of concurrent request workers
        #[arg(long)]
        max_workers: Option<usize>,

        /// Maximum number of live sessions
        #[arg(long)]
        max_sessions: Option<usize>,

        /// Directory for rolling log files
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a default configuration file
    Init {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            max_workers,
            max_sessions,
            log_dir,
            verbose,
        } => commands::serve::run(ServeArgs {
            config,
            host,
            port,
            max_workers,
            max_sessions,
            log_dir,
            verbose,
        }),
        Commands::Init { config, force } => commands::init::run(config, force),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
