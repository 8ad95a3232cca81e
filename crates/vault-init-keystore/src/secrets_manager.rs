//! Secrets Manager keystore
//!
//! Stores `<prefix>/unseal-keys.json` and `<prefix>/root-token` as binary
//! secrets encrypted server-side with the configured KMS key. Secret creation
//! fails when the name is taken, which makes a second initialization surface
//! as an error instead of replacing the first bundle.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use vault_init_core::types::{ROOT_TOKEN_OBJECT, UNSEAL_KEYS_OBJECT};
use vault_init_core::{KeyBundle, StorageLocation};

use crate::clients::SecretStore;
use crate::error::{KeystoreError, Result};
use crate::Keystore;

pub struct SecretsManagerKeystore {
    secrets: Arc<dyn SecretStore>,
    key_id: String,
    location: StorageLocation,
    closed: AtomicBool,
}

impl SecretsManagerKeystore {
    pub fn new(secrets: Arc<dyn SecretStore>, prefix: &str, key_id: impl Into<String>) -> Self {
        Self {
            secrets,
            key_id: key_id.into(),
            location: StorageLocation::new(None, prefix, UNSEAL_KEYS_OBJECT, ROOT_TOKEN_OBJECT),
            closed: AtomicBool::new(false),
        }
    }

    async fn create_secret(&self, name: String, content: Vec<u8>) -> Result<()> {
        self.secrets
            .create_secret(&name, &self.key_id, content)
            .await?;
        info!("Secret written to secretsmanager as '{}'", name);
        Ok(())
    }
}

#[async_trait]
impl Keystore for SecretsManagerKeystore {
    fn name(&self) -> &'static str {
        "secrets-manager"
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn encrypt_and_write(&self, bundle: &KeyBundle) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KeystoreError::Closed);
        }

        self.create_secret(self.location.bundle_key(), bundle.to_json()?)
            .await?;
        self.create_secret(self.location.root_token_key(), bundle.root_token_json()?)
            .await
    }

    async fn read_and_decrypt(&self) -> Result<KeyBundle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KeystoreError::Closed);
        }

        let name = self.location.bundle_key();
        let content = self.secrets.get_secret(&name).await?;
        KeyBundle::from_json(&content).map_err(|e| KeystoreError::decode(name, e))
    }

    async fn close(&self) {
        // Clients hold no per-session state
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed secrets-manager keystore for '{}'", self.location);
        }
    }
}

impl std::fmt::Debug for SecretsManagerKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsManagerKeystore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
