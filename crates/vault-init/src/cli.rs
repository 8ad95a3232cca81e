//! CLI argument parsing with clap
//!
//! Every option can also be set through its environment variable, which is
//! how the tool is normally configured when it runs next to Vault.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use vault_init_core::config::{
    DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_CREDENTIALS_RETRY_SECS, DEFAULT_SECRET_SHARES,
    DEFAULT_SECRET_THRESHOLD, DEFAULT_VAULT_ADDR, DEFAULT_VAULT_TIMEOUT_SECS,
};
use vault_init_core::{ConfigInput, KeystoreBackend, SecretString};

/// vault-init - Automates Vault initialization and unsealing
#[derive(Parser, Debug)]
#[command(name = "vault-init")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Vault API address
    #[arg(long, env = "VAULT_ADDR", default_value = DEFAULT_VAULT_ADDR)]
    pub vault_addr: String,

    /// Accept self-signed Vault certificates
    #[arg(
        long,
        env = "VAULT_SKIP_VERIFY",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub vault_skip_verify: bool,

    /// Vault request timeout in seconds
    #[arg(long, env = "VAULT_TIMEOUT", default_value_t = DEFAULT_VAULT_TIMEOUT_SECS)]
    pub vault_timeout: u64,

    /// Seconds between health checks
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = DEFAULT_CHECK_INTERVAL_SECS, allow_negative_numbers = true)]
    pub check_interval: i64,

    /// Keystore backend: kms, secrets-manager or s3-sse-c
    #[arg(long, env = "KEYSTORE_BACKEND", default_value_t = KeystoreBackend::Kms)]
    pub backend: KeystoreBackend,

    /// KMS key used by the kms and secrets-manager backends
    #[arg(long, env = "KMS_KEY_ID")]
    pub kms_key_id: Option<String>,

    /// Bucket for the kms and s3-sse-c backends
    #[arg(long, env = "BUCKET_NAME")]
    pub bucket_name: Option<String>,

    /// Object prefix inside the bucket
    #[arg(long, env = "BUCKET_PATH")]
    pub bucket_path: Option<String>,

    /// Secret name prefix for the secrets-manager backend
    #[arg(long, env = "SECRETS_PATH")]
    pub secrets_path: Option<String>,

    /// 32-byte customer key for the s3-sse-c backend
    #[arg(long, env = "SSE_C_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// AWS endpoint override (S3 switches to path-style addressing)
    #[arg(long, env = "AWS_ENDPOINT")]
    pub aws_endpoint: Option<String>,

    /// Seconds between credential probes while none are available
    #[arg(long, env = "CREDENTIALS_RETRY_INTERVAL", default_value_t = DEFAULT_CREDENTIALS_RETRY_SECS, allow_negative_numbers = true)]
    pub credentials_retry_interval: i64,

    /// Number of unseal shares to generate
    #[arg(long, env = "SECRET_SHARES", default_value_t = DEFAULT_SECRET_SHARES)]
    pub secret_shares: u32,

    /// Shares required to unseal
    #[arg(long, env = "SECRET_THRESHOLD", default_value_t = DEFAULT_SECRET_THRESHOLD)]
    pub secret_threshold: u32,

    /// Replica allowed to initialize Vault; unset lets every replica try
    #[arg(long, env = "INITIALIZER_ID")]
    pub initializer_id: Option<String>,

    /// Identity of this replica [default: $HOSTNAME]
    #[arg(long, env = "REPLICA_ID")]
    pub replica_id: Option<String>,
}

impl Cli {
    pub fn into_config_input(self) -> ConfigInput {
        let replica_id = self
            .replica_id
            .or_else(|| std::env::var("HOSTNAME").ok());

        ConfigInput {
            vault_addr: Some(self.vault_addr),
            vault_skip_verify: self.vault_skip_verify,
            vault_timeout_secs: self.vault_timeout,
            check_interval_secs: self.check_interval,
            backend: self.backend,
            kms_key_id: self.kms_key_id,
            bucket_name: self.bucket_name,
            bucket_path: self.bucket_path,
            secrets_path: self.secrets_path,
            encryption_key: self.encryption_key.map(SecretString::from),
            aws_endpoint: self.aws_endpoint,
            credentials_retry_secs: self.credentials_retry_interval,
            secret_shares: self.secret_shares,
            secret_threshold: self.secret_threshold,
            initializer_id: self.initializer_id,
            replica_id,
        }
    }
}
