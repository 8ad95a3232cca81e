//! KMS envelope + object storage keystore
//!
//! The bundle and the root token are each encrypted by a separate KMS call
//! and stored as two objects:
//!
//! - `unseal-keys.json.enc`: ciphertext of the full JSON bundle
//! - `root-token.enc`: ciphertext of the root token alone, so access to it
//!   can be granted or audited independently of the unseal keys
//!
//! Plaintext is base64-encoded before it is sent to KMS, and the ciphertext is
//! stored as base64 text.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use vault_init_core::config::KMS_MAX_PLAINTEXT_BYTES;
use vault_init_core::types::{ROOT_TOKEN_OBJECT_ENC, UNSEAL_KEYS_OBJECT_ENC};
use vault_init_core::{KeyBundle, StorageLocation};
use zeroize::Zeroize;

use crate::clients::{KmsApi, ObjectStore};
use crate::error::{KeystoreError, Result};
use crate::Keystore;

pub struct KmsKeystore {
    kms: Arc<dyn KmsApi>,
    objects: Arc<dyn ObjectStore>,
    key_id: String,
    bucket: String,
    location: StorageLocation,
    closed: AtomicBool,
}

impl KmsKeystore {
    pub fn new(
        kms: Arc<dyn KmsApi>,
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: &str,
        key_id: impl Into<String>,
    ) -> Self {
        let bucket = bucket.into();
        let location = StorageLocation::new(
            Some(bucket.clone()),
            prefix,
            UNSEAL_KEYS_OBJECT_ENC,
            ROOT_TOKEN_OBJECT_ENC,
        );

        Self {
            kms,
            objects,
            key_id: key_id.into(),
            bucket,
            location,
            closed: AtomicBool::new(false),
        }
    }

    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let encoded = BASE64.encode(plaintext).into_bytes();
        if encoded.len() > KMS_MAX_PLAINTEXT_BYTES {
            return Err(KeystoreError::kms(
                "encrypt",
                format!(
                    "payload of {} bytes exceeds the {}-byte KMS plaintext limit",
                    encoded.len(),
                    KMS_MAX_PLAINTEXT_BYTES
                ),
            ));
        }
        let ciphertext = self.kms.encrypt(&self.key_id, encoded).await?;
        Ok(BASE64.encode(ciphertext).into_bytes())
    }

    async fn decrypt(&self, key: &str, stored: Vec<u8>) -> Result<Vec<u8>> {
        let ciphertext = BASE64
            .decode(stored.trim_ascii())
            .map_err(|e| KeystoreError::decode(key, e))?;
        let encoded = self.kms.decrypt(&self.key_id, ciphertext).await?;
        BASE64
            .decode(encoded.trim_ascii())
            .map_err(|e| KeystoreError::decode(key, e))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(KeystoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Keystore for KmsKeystore {
    fn name(&self) -> &'static str {
        "kms"
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn encrypt_and_write(&self, bundle: &KeyBundle) -> Result<()> {
        self.ensure_open()?;

        let root_token_ciphertext = self.encrypt(bundle.root_token().as_bytes()).await?;
        let bundle_ciphertext = self.encrypt(&bundle.to_json()?).await?;

        let bundle_key = self.location.bundle_key();
        self.objects
            .put_new(&self.bucket, &bundle_key, bundle_ciphertext, None)
            .await?;
        info!("Unseal keys written to s3://{}/{}", self.bucket, bundle_key);

        let root_token_key = self.location.root_token_key();
        self.objects
            .put_new(&self.bucket, &root_token_key, root_token_ciphertext, None)
            .await?;
        info!("Root token written to s3://{}/{}", self.bucket, root_token_key);

        Ok(())
    }

    async fn read_and_decrypt(&self) -> Result<KeyBundle> {
        self.ensure_open()?;

        let key = self.location.bundle_key();
        let stored = self.objects.get(&self.bucket, &key, None).await?;
        debug!("Downloaded {} bytes from s3://{}/{}", stored.len(), self.bucket, key);

        let mut plaintext = self.decrypt(&key, stored).await?;
        let bundle = KeyBundle::from_json(&plaintext).map_err(|e| KeystoreError::decode(key, e));
        plaintext.zeroize();
        bundle
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed kms keystore for s3://{}", self.location);
        }
    }
}

impl std::fmt::Debug for KmsKeystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsKeystore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
