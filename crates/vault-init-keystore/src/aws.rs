//! AWS SDK implementations of the client traits

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_kms::primitives::Blob as KmsBlob;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_secretsmanager::primitives::Blob as SecretBlob;
use tracing::debug;

use crate::clients::{KmsApi, ObjectStore, SecretStore};
use crate::error::{KeystoreError, Result};
use crate::sse_c::CustomerKey;

/// S3 objects, with optional SSE-C
#[derive(Debug, Clone)]
pub struct S3Objects {
    client: aws_sdk_s3::Client,
}

impl S3Objects {
    /// Build a client; a custom endpoint switches to path-style addressing
    pub fn new(sdk_config: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if let Some(endpoint_url) = endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Objects {
    async fn put_new(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        sse: Option<&CustomerKey>,
    ) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", body.len(), bucket, key);

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(body));

        if let Some(customer_key) = sse {
            request = request
                .sse_customer_algorithm(customer_key.algorithm())
                .sse_customer_key(customer_key.encoded_key())
                .sse_customer_key_md5(customer_key.fingerprint());
        }

        match request.send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.code() == Some("PreconditionFailed") {
                    Err(KeystoreError::AlreadyExists {
                        key: format!("s3://{}/{}", bucket, key),
                    })
                } else {
                    Err(KeystoreError::storage(
                        "s3 put",
                        format!("s3://{}/{}", bucket, key),
                        DisplayErrorContext(&service_error).to_string(),
                    ))
                }
            }
        }
    }

    async fn get(&self, bucket: &str, key: &str, sse: Option<&CustomerKey>) -> Result<Vec<u8>> {
        debug!("Downloading s3://{}/{}", bucket, key);

        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(customer_key) = sse {
            request = request
                .sse_customer_algorithm(customer_key.algorithm())
                .sse_customer_key(customer_key.encoded_key())
                .sse_customer_key_md5(customer_key.fingerprint());
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(err) => {
                let service_error = err.into_service_error();
                let location = format!("s3://{}/{}", bucket, key);
                return if service_error.is_no_such_key() {
                    Err(KeystoreError::NotFound { key: location })
                } else {
                    Err(KeystoreError::storage(
                        "s3 get",
                        location,
                        DisplayErrorContext(&service_error).to_string(),
                    ))
                };
            }
        };

        let body = resp.body.collect().await.map_err(|e| {
            KeystoreError::storage("s3 read", format!("s3://{}/{}", bucket, key), e.to_string())
        })?;

        Ok(body.into_bytes().to_vec())
    }
}

/// AWS KMS symmetric encryption
#[derive(Debug, Clone)]
pub struct AwsKms {
    client: aws_sdk_kms::Client,
}

impl AwsKms {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_kms::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl KmsApi for AwsKms {
    async fn encrypt(&self, key_id: &str, plaintext: Vec<u8>) -> Result<Vec<u8>> {
        let resp = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(KmsBlob::new(plaintext))
            .send()
            .await
            .map_err(|e| KeystoreError::kms("encrypt", DisplayErrorContext(&e).to_string()))?;

        resp.ciphertext_blob
            .map(|blob| blob.into_inner())
            .ok_or_else(|| KeystoreError::kms("encrypt", "response has no ciphertext"))
    }

    async fn decrypt(&self, key_id: &str, ciphertext: Vec<u8>) -> Result<Vec<u8>> {
        let resp = self
            .client
            .decrypt()
            .key_id(key_id)
            .ciphertext_blob(KmsBlob::new(ciphertext))
            .send()
            .await
            .map_err(|e| KeystoreError::kms("decrypt", DisplayErrorContext(&e).to_string()))?;

        resp.plaintext
            .map(|blob| blob.into_inner())
            .ok_or_else(|| KeystoreError::kms("decrypt", "response has no plaintext"))
    }
}

/// AWS Secrets Manager binary secrets
#[derive(Debug, Clone)]
pub struct AwsSecretsManager {
    client: aws_sdk_secretsmanager::Client,
}

impl AwsSecretsManager {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_secretsmanager::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    async fn create_secret(&self, name: &str, kms_key_id: &str, value: Vec<u8>) -> Result<()> {
        match self
            .client
            .create_secret()
            .name(name)
            .kms_key_id(kms_key_id)
            .secret_binary(SecretBlob::new(value))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_error = err.into_service_error();
                if service_error.is_resource_exists_exception() {
                    Err(KeystoreError::AlreadyExists {
                        key: name.to_string(),
                    })
                } else {
                    Err(KeystoreError::storage(
                        "secretsmanager create",
                        name,
                        DisplayErrorContext(&service_error).to_string(),
                    ))
                }
            }
        }
    }

    async fn get_secret(&self, name: &str) -> Result<Vec<u8>> {
        let resp = match self.client.get_secret_value().secret_id(name).send().await {
            Ok(resp) => resp,
            Err(err) => {
                let service_error = err.into_service_error();
                return if service_error.is_resource_not_found_exception() {
                    Err(KeystoreError::NotFound {
                        key: name.to_string(),
                    })
                } else {
                    Err(KeystoreError::storage(
                        "secretsmanager get",
                        name,
                        DisplayErrorContext(&service_error).to_string(),
                    ))
                };
            }
        };

        resp.secret_binary
            .map(|blob| blob.into_inner())
            .ok_or_else(|| KeystoreError::decode(name, "secret has no binary value"))
    }
}
