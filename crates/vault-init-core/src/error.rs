//! Error types for vault-init-core

use thiserror::Error;

/// Result type alias using vault-init-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Startup configuration errors
///
/// Every variant is fatal: the process refuses to enter the control loop.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing required setting
    #[error("{field} must be set and not empty")]
    MissingField { field: String },

    /// Setting present but not usable
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Unknown keystore backend name
    #[error("Unknown keystore backend: {backend}. Valid backends: kms, secrets-manager, s3-sse-c")]
    UnknownBackend { backend: String },
}

impl Error {
    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
