//! Init command - write a default configuration file.

use std::path::{Path, PathBuf};

use trackhub::settings::Settings;

use super::config_path;
use crate::error::CliError;

/// Run the init command.
pub fn run(config: Option<PathBuf>, force: bool) -> Result<(), CliError> {
    let path = config_path(config)?;
    write_default(&path, force)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize TrackHub settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::ConfigExists(path.to_path_buf()));
    }
    Settings::default().save(path)?;
    Ok(())
}
