//! Serve command - run the tracking service until Ctrl+C.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::info;
use trackhub::app::TrackHubApp;
use trackhub::settings::Settings;

use super::config_path;
use crate::error::CliError;

/// Arguments for the serve command. `None` falls back to the config file.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_workers: Option<usize>,
    pub max_sessions: Option<usize>,
    pub log_dir: Option<PathBuf>,
    pub verbose: bool,
}

/// Applies CLI overrides on top of the loaded settings.
pub fn resolve(args: &ServeArgs, mut settings: Settings) -> Settings {
    let server = &mut settings.server;
    if let Some(host) = &args.host {
        server.host = host.clone();
    }
    if let Some(port) = args.port {
        server.port = port;
    }
    if let Some(max_workers) = args.max_workers {
        server.max_workers = max_workers;
    }
    if let Some(max_sessions) = args.max_sessions {
        server.max_sessions = max_sessions;
    }
    if let Some(dir) = &args.log_dir {
        settings.logging.directory = Some(dir.clone());
    }
    if args.verbose {
        settings.logging.filter = "trackhub=debug".to_string();
    }
    settings
}

/// Run the serve command.
pub fn run(args: ServeArgs) -> Result<(), CliError> {
    let path = config_path(args.config.clone())?;
    let settings = resolve(&args, Settings::load(&path)?);
    let _log_guard = trackhub::logging::init(&settings.logging)?;

    let server = settings.server;
    println!("TrackHub v{}", trackhub::VERSION);
    println!("============");
    println!();
    println!("Listening:    http://{}:{}/", server.host, server.port);
    println!("Workers:      {}", server.max_workers);
    println!("Max sessions: {}", server.max_sessions);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        signal.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    info!(config = %path.display(), "Configuration loaded");
    TrackHubApp::run_blocking(server, shutdown)?;
    println!("Stopped.");
    Ok(())
}
