//! Narrow client traits over the cloud services each backend needs
//!
//! The keystores only speak to these traits. [`crate::aws`] implements them
//! with the AWS SDK; tests implement them in memory.

use async_trait::async_trait;

use crate::error::Result;
use crate::sse_c::CustomerKey;

/// Symmetric encrypt/decrypt keyed by a managed key reference
#[async_trait]
pub trait KmsApi: Send + Sync {
    async fn encrypt(&self, key_id: &str, plaintext: Vec<u8>) -> Result<Vec<u8>>;

    async fn decrypt(&self, key_id: &str, ciphertext: Vec<u8>) -> Result<Vec<u8>>;
}

/// Bucket/key object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create `key`; fails with `AlreadyExists` if it is already present
    ///
    /// With `sse` set the server encrypts the object with the customer key.
    async fn put_new(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        sse: Option<&CustomerKey>,
    ) -> Result<()>;

    /// Fetch `key`; fails with `NotFound` if it is absent
    ///
    /// Objects written with a customer key can only be read with the same key.
    async fn get(&self, bucket: &str, key: &str, sse: Option<&CustomerKey>) -> Result<Vec<u8>>;
}

/// Managed secrets store with server-side encryption
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Create a secret; fails with `AlreadyExists` if the name is taken
    async fn create_secret(&self, name: &str, kms_key_id: &str, value: Vec<u8>) -> Result<()>;

    async fn get_secret(&self, name: &str) -> Result<Vec<u8>>;
}
