//! Core library for vault-init
//!
//! This crate holds the pieces shared by the keystore backends and the
//! controller binary:
//! - **Types**: the [`KeyBundle`] produced by initialization, cluster status
//!   snapshots and storage locations
//! - **Configuration**: the validated, immutable [`Config`] built once at startup
//! - **Retry**: a policy-based retry engine used by credential bootstrap

pub mod config;
pub mod error;
pub mod retry;
pub mod secret;
pub mod types;

pub use config::{
    AwsSettings, Config, ConfigInput, InitSettings, InitializerPolicy, KeystoreBackend,
    KeystoreConfig, VaultSettings,
};
pub use error::{Error, Result};
pub use secret::SecretString;
pub use types::{BundleError, ClusterPhase, ClusterStatus, KeyBundle, StorageLocation};
