//! Error types for keystore backends

use thiserror::Error;
use vault_init_core::BundleError;

use crate::credentials::CredentialError;

/// Result type alias using the keystore error
pub type Result<T> = std::result::Result<T, KeystoreError>;

#[derive(Error, Debug)]
pub enum KeystoreError {
    /// Object or secret does not exist
    #[error("{key} not found")]
    NotFound { key: String },

    /// Write-once target already exists
    #[error("{key} already exists, refusing to overwrite")]
    AlreadyExists { key: String },

    /// KMS encrypt/decrypt call failed
    #[error("KMS {operation} failed: {message}")]
    Kms {
        operation: &'static str,
        message: String,
    },

    /// Object storage or secrets store call failed
    #[error("{operation} of {key} failed: {message}")]
    Storage {
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Stored data could not be turned back into a bundle
    #[error("failed to decode {key}: {message}")]
    Decode { key: String, message: String },

    /// Bundle could not be serialized
    #[error("failed to encode key bundle: {0}")]
    Encode(#[from] serde_json::Error),

    /// Decoded bundle breaks its invariants
    #[error("invalid key bundle: {0}")]
    InvalidBundle(#[from] BundleError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Keystore used after `close`
    #[error("keystore is closed")]
    Closed,
}

impl KeystoreError {
    pub fn kms(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Kms {
            operation,
            message: message.into(),
        }
    }

    pub fn storage(operation: &'static str, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn decode(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            key: key.into(),
            message: message.to_string(),
        }
    }
}
