//! Listener configuration.

use std::net::{SocketAddr, ToSocketAddrs};

use super::ServerError;
use crate::pool::DEFAULT_MAX_WORKERS;
use crate::registry::DEFAULT_MAX_SESSIONS;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Default request body limit (16 MiB), sized for base64 frames.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Network and capacity settings of the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of concurrent handler executions.
    pub max_workers: usize,
    /// Maximum number of live sessions.
    pub max_sessions: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_workers: DEFAULT_MAX_WORKERS,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Resolves `host:port` to the first matching socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .to_socket_addrs()
            .map_err(|e| ServerError::Address {
                address: address.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| ServerError::Address {
                address,
                reason: "no addresses resolved".to_string(),
            })
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        for (field, value) in [
            ("max_workers", self.max_workers),
            ("max_sessions", self.max_sessions),
            ("max_body_bytes", self.max_body_bytes),
        ] {
            if value == 0 {
                return Err(ServerError::InvalidConfig(format!("{field} must be at least 1")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.max_workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let addr = ServerConfig::new("127.0.0.1", 9001).socket_addr().unwrap();
        assert_eq!(addr, "127.0.0.1:9001".parse().unwrap());
    }

    #[test]
    fn test_bad_host_is_address_error() {
        let err = ServerConfig::new("not a host", 1).socket_addr().unwrap_err();
        assert!(matches!(err, ServerError::Address { .. }));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ServerConfig::default().with_max_workers(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }
}
