//! INI configuration file.
//!
//! ```ini
//! [server]
//! host = 127.0.0.1
//! port = 8000
//! max_workers = 4
//! max_sessions = 64
//! max_body_bytes = 16777216
//!
//! [logging]
//! directory = /var/log/trackhub
//! filter = trackhub=info
//! ```
//!
//! A missing file yields the defaults. Missing keys keep their default and
//! unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::logging::LoggingConfig;
use crate::server::ServerConfig;

const SERVER_SECTION: &str = "server";
const LOGGING_SECTION: &str = "logging";

/// Errors raised while reading or writing the configuration file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("no configuration directory available on this platform")]
    NoConfigDir,
}

/// Everything the service reads from its configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// `<config dir>/trackhub/config.ini`.
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|dir| dir.join("trackhub").join("config.ini"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Loads `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => SettingsError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => SettingsError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    pub fn from_ini(ini: &Ini) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(section) = ini.section(Some(SERVER_SECTION)) {
            let server = &mut settings.server;
            if let Some(host) = section.get("host") {
                let host = host.trim();
                if host.is_empty() {
                    return Err(invalid(SERVER_SECTION, "host", host, "must not be empty"));
                }
                server.host = host.to_string();
            }
            parse_into(section.get("port"), SERVER_SECTION, "port", &mut server.port)?;
            for (key, target) in [
                ("max_workers", &mut server.max_workers),
                ("max_sessions", &mut server.max_sessions),
                ("max_body_bytes", &mut server.max_body_bytes),
            ] {
                parse_into(section.get(key), SERVER_SECTION, key, target)?;
                if *target == 0 {
                    return Err(invalid(SERVER_SECTION, key, "0", "must be at least 1"));
                }
            }
        }

        if let Some(section) = ini.section(Some(LOGGING_SECTION)) {
            if let Some(dir) = section.get("directory").map(str::trim) {
                settings.logging.directory = (!dir.is_empty()).then(|| PathBuf::from(dir));
            }
            if let Some(filter) = section.get("filter").map(str::trim) {
                if !filter.is_empty() {
                    settings.logging.filter = filter.to_string();
                }
            }
        }

        Ok(settings)
    }

    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some(SERVER_SECTION))
            .set("host", self.server.host.as_str())
            .set("port", self.server.port.to_string())
            .set("max_workers", self.server.max_workers.to_string())
            .set("max_sessions", self.server.max_sessions.to_string())
            .set("max_body_bytes", self.server.max_body_bytes.to_string());
        let directory = self
            .logging
            .directory
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_default();
        ini.with_section(Some(LOGGING_SECTION))
            .set("directory", directory)
            .set("filter", self.logging.filter.as_str());
        ini
    }

    /// Writes the file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|source| SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn invalid(section: &'static str, key: &'static str, value: &str, reason: &str) -> SettingsError {
    SettingsError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_into<T>(
    raw: Option<&str>,
    section: &'static str,
    key: &'static str,
    target: &mut T,
) -> Result<(), SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = raw {
        *target = raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(section, key, raw, &e.to_string()))?;
    }
    Ok(())
}
