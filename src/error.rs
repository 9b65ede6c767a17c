//! Error types for the order backend client and configuration loading.
//!
//! None of these escape the refresh coordinator's public operations; they are
//! logged and turned into transient operator notifications there.

use thiserror::Error;

/// Failure talking to the order backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    /// The HTTP client could not be constructed.
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// Connection refused, DNS failure, timeout and similar.
    #[error("{0}")]
    Transport(String),

    /// The backend answered with a non-2xx status.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    /// The body was not valid JSON.
    #[error("Invalid JSON from order backend: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Invalid process configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid order backend URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },

    #[error("{key} must be a positive whole number of seconds, got {value:?}")]
    InvalidDuration { key: &'static str, value: String },

    #[error("{key} must be one of on/off/true/false/1/0, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },
}
