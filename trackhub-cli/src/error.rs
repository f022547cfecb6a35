//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use trackhub::app::AppError;
use trackhub::logging::LoggingError;
use trackhub::settings::SettingsError;

/// Errors surfaced to the user by any command.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be read or written.
    Settings(SettingsError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The service failed to start or stopped with an error.
    Serve(AppError),

    /// Refused to overwrite an existing configuration file.
    ConfigExists(PathBuf),

    /// Generic configuration problem.
    Config(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Settings(e) => write!(f, "Configuration error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Serve(e) => write!(f, "{}", e),
            CliError::ConfigExists(path) => write!(
                f,
                "Configuration file already exists: {} (use --force to overwrite)",
                path.display()
            ),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Settings(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Serve(e) => Some(e),
            CliError::ConfigExists(_) | CliError::Config(_) => None,
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(e: SettingsError) -> Self {
        CliError::Settings(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<AppError> for CliError {
    fn from(e: AppError) -> Self {
        CliError::Serve(e)
    }
}
