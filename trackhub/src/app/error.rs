//! Application error types.

use std::fmt;

use crate::server::ServerError;

/// Errors that can occur during application lifecycle.
#[derive(Debug)]
pub enum AppError {
    /// Failed to bind the listener.
    Bind(ServerError),

    /// The listener stopped with an error.
    Serve(ServerError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Bind(e) => write!(f, "Failed to start listener: {}", e),
            AppError::Serve(e) => write!(f, "Listener failed: {}", e),
            AppError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Bind(e) | AppError::Serve(e) => Some(e),
            AppError::RuntimeCreation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Bind(ServerError::InvalidConfig("max_workers must be at least 1".into()));
        assert!(err.to_string().contains("Failed to start listener"));
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn test_app_error_source() {
        use std::error::Error;
        let err = AppError::RuntimeCreation("no threads".to_string());
        assert!(err.source().is_none());
        let err = AppError::Serve(ServerError::InvalidConfig("x".to_string()));
        assert!(err.source().is_some());
    }
}
