//! Validated runtime configuration
//!
//! [`ConfigInput`] is the raw shape collected from flags and environment
//! variables. [`Config::from_input`] validates it once at startup and produces
//! the immutable [`Config`] handed to the keystore and controller.

use crate::error::{Error, Result};
use crate::secret::SecretString;
use crate::types::max_bundle_json_len;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default Vault API address
pub const DEFAULT_VAULT_ADDR: &str = "https://127.0.0.1:8200";

/// Default tick cadence in seconds
pub const DEFAULT_CHECK_INTERVAL_SECS: i64 = 10;

/// Default wait between credential probes in seconds
pub const DEFAULT_CREDENTIALS_RETRY_SECS: i64 = 5;

/// Default number of generated unseal shares
pub const DEFAULT_SECRET_SHARES: u32 = 5;

/// Default number of shares needed to unseal
pub const DEFAULT_SECRET_THRESHOLD: u32 = 3;

/// Default Vault HTTP timeout in seconds
pub const DEFAULT_VAULT_TIMEOUT_SECS: u64 = 30;

/// Length in bytes of an SSE-C AES-256 customer key
pub const CUSTOMER_KEY_LEN: usize = 32;

/// Largest share count Vault accepts
pub const MAX_SECRET_SHARES: u32 = 255;

/// Largest plaintext a single KMS `Encrypt` call accepts
pub const KMS_MAX_PLAINTEXT_BYTES: usize = 4096;

/// Worst-case size of the KMS plaintext for a bundle of `shares` shares
///
/// The bundle JSON is base64-encoded before it is sent to KMS.
pub fn kms_payload_len(shares: u32) -> usize {
    max_bundle_json_len(shares).div_ceil(3) * 4
}

/// Keystore backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeystoreBackend {
    /// AWS KMS envelope + S3 objects (default)
    #[default]
    Kms,
    /// AWS Secrets Manager with a KMS key
    SecretsManager,
    /// S3 with a customer-supplied encryption key
    S3SseC,
}

impl fmt::Display for KeystoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeystoreBackend::Kms => write!(f, "kms"),
            KeystoreBackend::SecretsManager => write!(f, "secrets-manager"),
            KeystoreBackend::S3SseC => write!(f, "s3-sse-c"),
        }
    }
}

impl FromStr for KeystoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kms" => Ok(KeystoreBackend::Kms),
            "secrets-manager" => Ok(KeystoreBackend::SecretsManager),
            "s3-sse-c" => Ok(KeystoreBackend::S3SseC),
            other => Err(Error::UnknownBackend {
                backend: other.to_string(),
            }),
        }
    }
}

/// Raw settings as collected from flags and environment variables
#[derive(Debug, Clone)]
pub struct ConfigInput {
    pub vault_addr: Option<String>,
    pub vault_skip_verify: bool,
    pub vault_timeout_secs: u64,
    pub check_interval_secs: i64,
    pub backend: KeystoreBackend,
    pub kms_key_id: Option<String>,
    pub bucket_name: Option<String>,
    pub bucket_path: Option<String>,
    pub secrets_path: Option<String>,
    pub encryption_key: Option<SecretString>,
    pub aws_endpoint: Option<String>,
    pub credentials_retry_secs: i64,
    pub secret_shares: u32,
    pub secret_threshold: u32,
    pub initializer_id: Option<String>,
    pub replica_id: Option<String>,
}

impl Default for ConfigInput {
    fn default() -> Self {
        Self {
            vault_addr: None,
            vault_skip_verify: true,
            vault_timeout_secs: DEFAULT_VAULT_TIMEOUT_SECS,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            backend: KeystoreBackend::default(),
            kms_key_id: None,
            bucket_name: None,
            bucket_path: None,
            secrets_path: None,
            encryption_key: None,
            aws_endpoint: None,
            credentials_retry_secs: DEFAULT_CREDENTIALS_RETRY_SECS,
            secret_shares: DEFAULT_SECRET_SHARES,
            secret_threshold: DEFAULT_SECRET_THRESHOLD,
            initializer_id: None,
            replica_id: None,
        }
    }
}

/// Vault API connection settings
#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub address: String,
    pub skip_verify: bool,
    pub timeout: Duration,
}

/// AWS client bootstrap settings shared by every backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    /// Service endpoint override, e.g. a local S3-compatible server
    pub endpoint: Option<String>,
    /// Wait between credential probes while the provider chain is empty
    pub credentials_retry: Duration,
}

/// Backend-specific location and encryption reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeystoreConfig {
    Kms {
        bucket: String,
        prefix: String,
        key_id: String,
    },
    SecretsManager {
        prefix: String,
        key_id: String,
    },
    S3SseC {
        bucket: String,
        prefix: String,
        key: SecretString,
    },
}

impl KeystoreConfig {
    pub fn backend(&self) -> KeystoreBackend {
        match self {
            KeystoreConfig::Kms { .. } => KeystoreBackend::Kms,
            KeystoreConfig::SecretsManager { .. } => KeystoreBackend::SecretsManager,
            KeystoreConfig::S3SseC { .. } => KeystoreBackend::S3SseC,
        }
    }
}

/// Decides whether this replica may call initialize
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitializerPolicy {
    /// Identity of the replica allowed to initialize; `None` lets every replica try
    pub designated: Option<String>,
    /// Identity of this replica
    pub replica: Option<String>,
}

impl InitializerPolicy {
    pub fn new(designated: Option<String>, replica: Option<String>) -> Self {
        Self {
            designated: designated.filter(|s| !s.is_empty()),
            replica: replica.filter(|s| !s.is_empty()),
        }
    }

    pub fn should_initialize(&self) -> bool {
        match (&self.designated, &self.replica) {
            (None, _) => true,
            (Some(designated), Some(replica)) => designated == replica,
            (Some(_), None) => false,
        }
    }
}

/// Initialization parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSettings {
    pub secret_shares: u32,
    pub secret_threshold: u32,
    pub initializer: InitializerPolicy,
}

/// Immutable configuration built once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub vault: VaultSettings,
    pub check_interval: Duration,
    pub init: InitSettings,
    pub keystore: KeystoreConfig,
    pub aws: AwsSettings,
}

impl Config {
    /// Validate raw settings
    pub fn from_input(input: ConfigInput) -> Result<Self> {
        if input.check_interval_secs <= 0 {
            return Err(Error::invalid_config(format!(
                "CHECK_INTERVAL must be a positive number of seconds, got {}",
                input.check_interval_secs
            )));
        }

        if input.vault_timeout_secs == 0 {
            return Err(Error::invalid_config("VAULT_TIMEOUT must be at least 1 second"));
        }

        if input.secret_threshold == 0 {
            return Err(Error::invalid_config("SECRET_THRESHOLD must be at least 1"));
        }
        if input.secret_shares > MAX_SECRET_SHARES {
            return Err(Error::invalid_config(format!(
                "SECRET_SHARES must not exceed {}, got {}",
                MAX_SECRET_SHARES, input.secret_shares
            )));
        }
        if input.secret_threshold > input.secret_shares {
            return Err(Error::invalid_config(format!(
                "SECRET_THRESHOLD ({}) must not exceed SECRET_SHARES ({})",
                input.secret_threshold, input.secret_shares
            )));
        }

        let address = non_empty(input.vault_addr).unwrap_or_else(|| DEFAULT_VAULT_ADDR.to_string());

        let credentials_retry_secs = if input.credentials_retry_secs > 0 {
            input.credentials_retry_secs
        } else {
            DEFAULT_CREDENTIALS_RETRY_SECS
        };

        let keystore = match input.backend {
            KeystoreBackend::Kms => {
                // Vault is initialized before the bundle is encrypted, so an
                // oversized bundle would be unrecoverable
                let payload = kms_payload_len(input.secret_shares);
                if payload > KMS_MAX_PLAINTEXT_BYTES {
                    return Err(Error::invalid_config(format!(
                        "SECRET_SHARES={} is too many for the kms backend: the encrypted bundle \
                         may reach {} bytes, above the {}-byte KMS limit",
                        input.secret_shares, payload, KMS_MAX_PLAINTEXT_BYTES
                    )));
                }
                KeystoreConfig::Kms {
                    bucket: required(input.bucket_name, "BUCKET_NAME")?,
                    prefix: input.bucket_path.unwrap_or_default(),
                    key_id: required(input.kms_key_id, "KMS_KEY_ID")?,
                }
            }
            KeystoreBackend::SecretsManager => KeystoreConfig::SecretsManager {
                prefix: required(input.secrets_path, "SECRETS_PATH")?,
                key_id: required(input.kms_key_id, "KMS_KEY_ID")?,
            },
            KeystoreBackend::S3SseC => {
                let key = input
                    .encryption_key
                    .filter(|k| !k.is_empty())
                    .ok_or_else(|| Error::missing_field("SSE_C_KEY"))?;
                if key.len() != CUSTOMER_KEY_LEN {
                    return Err(Error::invalid_config(format!(
                        "SSE_C_KEY must be exactly {} bytes, got {}",
                        CUSTOMER_KEY_LEN,
                        key.len()
                    )));
                }
                KeystoreConfig::S3SseC {
                    bucket: required(input.bucket_name, "BUCKET_NAME")?,
                    prefix: input.bucket_path.unwrap_or_default(),
                    key,
                }
            }
        };

        Ok(Self {
            vault: VaultSettings {
                address,
                skip_verify: input.vault_skip_verify,
                timeout: Duration::from_secs(input.vault_timeout_secs),
            },
            check_interval: Duration::from_secs(input.check_interval_secs as u64),
            init: InitSettings {
                secret_shares: input.secret_shares,
                secret_threshold: input.secret_threshold,
                initializer: InitializerPolicy::new(input.initializer_id, input.replica_id),
            },
            keystore,
            aws: AwsSettings {
                endpoint: non_empty(input.aws_endpoint),
                credentials_retry: Duration::from_secs(credentials_retry_secs as u64),
            },
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_empty(value).ok_or_else(|| Error::missing_field(field))
}
