//! CLI subcommands.

pub mod config;
pub mod init;
pub mod serve;

use std::path::PathBuf;

use trackhub::settings::Settings;

use crate::error::CliError;

/// Explicit `--config` path, or the platform default.
pub fn config_path(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path),
        None => Ok(Settings::default_path()?),
    }
}
