//! In-memory fakes for the keystore client traits
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use vault_init_core::KeyBundle;
use vault_init_keystore::{CustomerKey, KeystoreError, KmsApi, ObjectStore, Result, SecretStore};

pub const SSE_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const OTHER_SSE_KEY: &str = "fedcba9876543210fedcba9876543210";

/// Five shares, threshold three, in a deliberately unsorted order
pub fn sample_bundle() -> KeyBundle {
    KeyBundle::from_parts(
        vec![
            "e3".into(),
            "a1".into(),
            "c2".into(),
            "05".into(),
            "b4".into(),
        ],
        vec![
            "4w==".into(),
            "oQ==".into(),
            "wg==".into(),
            "BQ==".into(),
            "tA==".into(),
        ],
        5,
        3,
        "hvs.root-token",
    )
    .expect("sample bundle is valid")
}

/// Reversible stand-in for KMS: ciphertext is tagged with the key id
#[derive(Default)]
pub struct FakeKms {
    pub calls: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl KmsApi for FakeKms {
    async fn encrypt(&self, key_id: &str, plaintext: Vec<u8>) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push("encrypt");
        if plaintext.len() > 4096 {
            return Err(KeystoreError::kms(
                "encrypt",
                "ValidationException: plaintext must be at most 4096 bytes",
            ));
        }
        let mut ciphertext = format!("{}|", key_id).into_bytes();
        ciphertext.extend(plaintext.iter().rev().map(|b| b ^ 0x5a));
        Ok(ciphertext)
    }

    async fn decrypt(&self, key_id: &str, ciphertext: Vec<u8>) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push("decrypt");
        let tag = format!("{}|", key_id).into_bytes();
        let body = ciphertext
            .strip_prefix(tag.as_slice())
            .ok_or_else(|| KeystoreError::kms("decrypt", "InvalidCiphertextException"))?;
        Ok(body.iter().rev().map(|b| b ^ 0x5a).collect())
    }
}

#[derive(Clone)]
struct StoredObject {
    body: Vec<u8>,
    fingerprint: Option<String>,
}

/// Object store keyed by `bucket/key`, enforcing write-once and SSE-C keys
#[derive(Default)]
pub struct MemoryObjects {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl MemoryObjects {
    pub fn raw(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&format!("{}/{}", bucket, key))
            .map(|o| o.body.clone())
    }

    pub fn overwrite(&self, bucket: &str, key: &str, body: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap();
        let entry = objects
            .entry(format!("{}/{}", bucket, key))
            .or_insert(StoredObject {
                body: Vec::new(),
                fingerprint: None,
            });
        entry.body = body;
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjects {
    async fn put_new(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        sse: Option<&CustomerKey>,
    ) -> Result<()> {
        let path = format!("{}/{}", bucket, key);
        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&path) {
            return Err(KeystoreError::AlreadyExists { key: path });
        }
        objects.insert(
            path,
            StoredObject {
                body,
                fingerprint: sse.map(|k| k.fingerprint().to_string()),
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str, sse: Option<&CustomerKey>) -> Result<Vec<u8>> {
        let path = format!("{}/{}", bucket, key);
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(&path)
            .ok_or_else(|| KeystoreError::NotFound { key: path.clone() })?;

        let presented = sse.map(|k| k.fingerprint().to_string());
        if object.fingerprint != presented {
            return Err(KeystoreError::storage(
                "s3 get",
                path,
                "AccessDenied: the provided encryption key does not match",
            ));
        }
        Ok(object.body.clone())
    }
}

/// Secrets store that rejects duplicate names
#[derive(Default)]
pub struct MemorySecrets {
    secrets: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MemorySecrets {
    pub fn raw(&self, name: &str) -> Option<(String, Vec<u8>)> {
        self.secrets.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn create_secret(&self, name: &str, kms_key_id: &str, value: Vec<u8>) -> Result<()> {
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(name) {
            return Err(KeystoreError::AlreadyExists {
                key: name.to_string(),
            });
        }
        secrets.insert(name.to_string(), (kms_key_id.to_string(), value));
        Ok(())
    }

    async fn get_secret(&self, name: &str) -> Result<Vec<u8>> {
        self.secrets
            .lock()
            .unwrap()
            .get(name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| KeystoreError::NotFound {
                key: name.to_string(),
            })
    }
}
