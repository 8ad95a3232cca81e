//! Encrypted storage for Vault unseal keys and the root token
//!
//! This crate provides the [`Keystore`] capability and three interchangeable
//! backends:
//! - **kms**: KMS-encrypted objects in S3 ([`KmsKeystore`])
//! - **secrets-manager**: Secrets Manager secrets with a KMS key ([`SecretsManagerKeystore`])
//! - **s3-sse-c**: S3 objects with a customer-supplied key ([`SseCKeystore`])
//!
//! The backend is chosen once at startup by [`build_keystore`].

pub mod aws;
pub mod clients;
pub mod credentials;
pub mod error;
pub mod kms;
pub mod secrets_manager;
pub mod sse_c;

pub use clients::{KmsApi, ObjectStore, SecretStore};
pub use credentials::{resolve_session, wait_for_credentials, CredentialError, CredentialProbe};
pub use error::{KeystoreError, Result};
pub use kms::KmsKeystore;
pub use secrets_manager::SecretsManagerKeystore;
pub use sse_c::{CustomerKey, SseCKeystore};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use vault_init_core::{AwsSettings, KeyBundle, KeystoreConfig, StorageLocation};

use crate::aws::{AwsKms, AwsSecretsManager, S3Objects};

/// Persists and retrieves the key bundle
///
/// `encrypt_and_write` is called once per initialization and is not
/// idempotent: backends refuse to overwrite existing material.
#[async_trait]
pub trait Keystore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    fn location(&self) -> &StorageLocation;

    /// Encrypt and store the full bundle and, separately, the root token
    async fn encrypt_and_write(&self, bundle: &KeyBundle) -> Result<()>;

    /// Fetch and decrypt the full bundle
    async fn read_and_decrypt(&self) -> Result<KeyBundle>;

    /// Release held resources; safe to call more than once
    async fn close(&self);
}

/// Resolve credentials and construct the configured backend
pub async fn build_keystore(
    config: &KeystoreConfig,
    aws: &AwsSettings,
) -> Result<Arc<dyn Keystore>> {
    let sdk_config = resolve_session(aws).await?;
    let endpoint = aws.endpoint.as_deref();

    let keystore: Arc<dyn Keystore> = match config {
        KeystoreConfig::Kms {
            bucket,
            prefix,
            key_id,
        } => Arc::new(KmsKeystore::new(
            Arc::new(AwsKms::new(&sdk_config)),
            Arc::new(S3Objects::new(&sdk_config, endpoint)),
            bucket.clone(),
            prefix,
            key_id.clone(),
        )),
        KeystoreConfig::SecretsManager { prefix, key_id } => Arc::new(
            SecretsManagerKeystore::new(
                Arc::new(AwsSecretsManager::new(&sdk_config)),
                prefix,
                key_id.clone(),
            ),
        ),
        KeystoreConfig::S3SseC {
            bucket,
            prefix,
            key,
        } => Arc::new(SseCKeystore::new(
            Arc::new(S3Objects::new(&sdk_config, endpoint)),
            bucket.clone(),
            prefix,
            key,
        )),
    };

    info!(
        backend = keystore.name(),
        location = %keystore.location(),
        "Keystore ready"
    );
    Ok(keystore)
}
