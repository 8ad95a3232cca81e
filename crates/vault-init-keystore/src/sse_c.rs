//! S3 keystore with customer-supplied encryption keys (SSE-C)
//!
//! The server encrypts each object with a key we send on every request and
//! never stores the key itself. Each request must carry the algorithm, the
//! base64 key and the base64 MD5 of the key; the MD5 is computed once here.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use vault_init_core::types::{ROOT_TOKEN_OBJECT, UNSEAL_KEYS_OBJECT};
use vault_init_core::{KeyBundle, SecretString, StorageLocation};
use zeroize::Zeroize;

use crate::clients::ObjectStore;
use crate::error::{KeystoreError, Result};
use crate::Keystore;

/// SSE-C algorithm header value
pub const SSE_C_ALGORITHM: &str = "AES256";

/// Customer-supplied key with its cached fingerprint
#[derive(Clone, PartialEq, Eq)]
pub struct CustomerKey {
    encoded: SecretString,
    fingerprint: String,
}

impl CustomerKey {
    pub fn new(key: &SecretString) -> Self {
        let digest = md5::compute(key.as_bytes());
        Self {
            encoded: SecretString::new(BASE64.encode(key.as_bytes())),
            fingerprint: BASE64.encode(digest.0),
        }
    }

    pub fn algorithm(&self) -> &'static str {
        SSE_C_ALGORITHM
    }

    /// Base64 of the raw key, as sent in the request header
    pub fn encoded_key(&self) -> &str {
        self.encoded.expose()
    }

    /// Base64 MD5 of the raw key
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for CustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomerKey")
            .field("algorithm", &SSE_C_ALGORITHM)
            .finish_non_exhaustive()
    }
}

pub struct SseCKeystore {
    objects: Arc<dyn ObjectStore>,
    key: CustomerKey,
    bucket: String,
    location: StorageLocation,
    closed: AtomicBool,
}

impl SseCKeystore {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: &str,
        key: &SecretString,
    ) -> Self {
        let bucket = bucket.into();
        Self {
            objects,
            key: CustomerKey::new(key),
            location: StorageLocation::new(
                Some(bucket.clone()),
                prefix,
                UNSEAL_KEYS_OBJECT,
                ROOT_TOKEN_OBJECT,
            ),
            bucket,
            closed: AtomicBool::new(false),
        }
    }

    pub fn customer_key(&self) -> &CustomerKey {
        &self.key
    }

    async fn put(&self, key: String, body: Vec<u8>) -> Result<()> {
        self.objects
            .put_new(&self.bucket, &key, body, Some(&self.key))
            .await?;
        info!("Object written to s3://{}/{} (SSE-C)", self.bucket, key);
        Ok(())
    }
}

#[async_trait]
impl Keystore for SseCKeystore {
    fn name(&self) -> &'static str {
        "s3-sse-c"
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn encrypt_and_write(&self, bundle: &KeyBundle) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KeystoreError::Closed);
        }

        self.put(self.location.bundle_key(), bundle.to_json()?).await?;
        self.put(self.location.root_token_key(), bundle.root_token_json()?)
            .await
    }

    async fn read_and_decrypt(&self) -> Result<KeyBundle> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KeystoreError::Closed);
        }

        let key = self.location.bundle_key();
        let mut body = self.objects.get(&self.bucket, &key, Some(&self.key)).await?;
        let bundle = KeyBundle::from_json(&body).map_err(|e| KeystoreError::decode(key, e));
        body.zeroize();
        bundle
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed s3-sse-c keystore for s3://{}", self.location);
        }
    }
}

impl fmt::Debug for SseCKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseCKeystore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
