//! Request rejection reasons and their HTTP mapping.

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::session::{ConfigError, ConversionError};

/// Why a request was rejected before or during dispatch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    /// Path other than `/` (404).
    #[error("no resource at {path}")]
    NotFound { path: String },

    /// Method other than GET, POST or DELETE (405).
    #[error("method {method} is not allowed")]
    MethodNotAllowed { method: String },

    /// POST body is not declared as JSON (406).
    #[error("content type must be application/json")]
    NotAcceptable,

    /// POST without Content-Length (411).
    #[error("Content-Length header is required")]
    LengthRequired,

    /// Session-Id required but missing or empty (400).
    #[error("Session-Id header is missing or empty")]
    MissingSessionId,

    /// Body or headers could not be parsed (400).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Session configuration failed validation (400).
    #[error("invalid session configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// Detection rows failed conversion (400).
    #[error("invalid detections: {0}")]
    InvalidDetections(#[from] ConversionError),

    /// Body exceeds the configured limit (413).
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Registry is full (503).
    #[error("session limit of {max} reached")]
    CapacityExceeded { max: usize },

    /// No worker could be assigned (503).
    #[error("server is shutting down")]
    Unavailable,

    /// Token does not resolve to a live session (404).
    #[error("session not found")]
    SessionNotFound,

    /// Unexpected server-side failure (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::NotAcceptable => StatusCode::NOT_ACCEPTABLE,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::MissingSessionId
            | Self::MalformedRequest(_)
            | Self::InvalidConfig(_)
            | Self::InvalidDetections(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::CapacityExceeded { .. } | Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code sent in the `error` field.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::NotAcceptable => "NOT_ACCEPTABLE",
            Self::LengthRequired => "LENGTH_REQUIRED",
            Self::MissingSessionId => "MISSING_SESSION_ID",
            Self::MalformedRequest(_) => "MALFORMED_REQUEST",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidDetections(_) => "INVALID_DETECTIONS",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::Unavailable => "UNAVAILABLE",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error_code(),
            message: self.to_string(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}
