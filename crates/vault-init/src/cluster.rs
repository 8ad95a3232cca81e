//! Vault system API client
//!
//! Only the three `sys` endpoints needed for bootstrapping are covered:
//! health, init and unseal.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use vault_init_core::{BundleError, ClusterStatus, KeyBundle, VaultSettings};

/// Health query that answers 200 for every state so the body can be read
const HEALTH_PATH: &str =
    "/v1/sys/health?standbyok=true&sealedcode=200&uninitcode=200&perfstandbyok=true";
const INIT_PATH: &str = "/v1/sys/init";
const UNSEAL_PATH: &str = "/v1/sys/unseal";

#[derive(Error, Debug)]
pub enum ClusterError {
    /// Request never produced a response
    #[error("{operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Vault answered with a non-success status
    #[error("{operation} returned {status}: {}", .errors.join("; "))]
    Status {
        operation: &'static str,
        status: u16,
        errors: Vec<String>,
    },

    /// Response body did not match the expected shape
    #[error("{operation} response could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// Init response violated the bundle invariants
    #[error("init response is not a usable key bundle: {0}")]
    InvalidBundle(#[from] BundleError),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Seal state reported after a share is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UnsealProgress {
    pub sealed: bool,
    #[serde(rename = "t", default)]
    pub threshold: u32,
    #[serde(default)]
    pub progress: u32,
}

/// The remote cluster
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn health(&self) -> Result<ClusterStatus, ClusterError>;

    /// Generate a new key bundle; only ever succeeds once per cluster
    async fn initialize(&self, shares: u32, threshold: u32) -> Result<KeyBundle, ClusterError>;

    async fn unseal(&self, share: &str) -> Result<UnsealProgress, ClusterError>;
}

#[derive(Serialize)]
struct InitRequest {
    secret_shares: u32,
    secret_threshold: u32,
}

#[derive(Deserialize)]
struct InitResponse {
    #[serde(default)]
    keys: Vec<String>,
    keys_base64: Vec<String>,
    root_token: String,
}

#[derive(Serialize)]
struct UnsealRequest<'a> {
    key: &'a str,
}

#[derive(Deserialize)]
struct HealthResponse {
    initialized: bool,
    sealed: bool,
    #[serde(default)]
    standby: bool,
}

#[derive(Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    errors: Vec<String>,
}

/// [`ClusterApi`] over Vault's HTTP API
#[derive(Debug, Clone)]
pub struct VaultHttpClient {
    client: reqwest::Client,
    address: String,
}

impl VaultHttpClient {
    pub fn new(settings: &VaultSettings) -> Result<Self, ClusterError> {
        let client = reqwest::Client::builder()
            .user_agent(format!("vault-init/{}", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .connect_timeout(settings.timeout.min(Duration::from_secs(10)))
            .danger_accept_invalid_certs(settings.skip_verify)
            .build()
            .map_err(|e| ClusterError::Client(e.to_string()))?;

        Ok(Self {
            client,
            address: settings.address.trim_end_matches('/').to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        operation: &'static str,
        response: reqwest::Response,
    ) -> Result<T, ClusterError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClusterError::Transport { operation, source })?;

        if !status.is_success() {
            return Err(status_error(operation, status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| ClusterError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

fn status_error(operation: &'static str, status: StatusCode, body: &[u8]) -> ClusterError {
    let errors = serde_json::from_slice::<ErrorResponse>(body)
        .unwrap_or_default()
        .errors;
    ClusterError::Status {
        operation,
        status: status.as_u16(),
        errors,
    }
}

#[async_trait]
impl ClusterApi for VaultHttpClient {
    async fn health(&self) -> Result<ClusterStatus, ClusterError> {
        const OP: &str = "health";

        let response = self
            .client
            .get(self.url(HEALTH_PATH))
            .send()
            .await
            .map_err(|source| ClusterError::Transport {
                operation: OP,
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClusterError::Transport {
                operation: OP,
                source,
            })?;

        // Older listeners ignore the code overrides but still send the body
        match serde_json::from_slice::<HealthResponse>(&body) {
            Ok(health) => {
                debug!(
                    status = status.as_u16(),
                    initialized = health.initialized,
                    sealed = health.sealed,
                    standby = health.standby,
                    "Health response"
                );
                Ok(ClusterStatus {
                    initialized: health.initialized,
                    sealed: health.sealed,
                    standby: health.standby,
                })
            }
            Err(_) if !status.is_success() => Err(status_error(OP, status, &body)),
            Err(e) => Err(ClusterError::Decode {
                operation: OP,
                message: e.to_string(),
            }),
        }
    }

    async fn initialize(&self, shares: u32, threshold: u32) -> Result<KeyBundle, ClusterError> {
        const OP: &str = "init";

        let response = self
            .client
            .put(self.url(INIT_PATH))
            .json(&InitRequest {
                secret_shares: shares,
                secret_threshold: threshold,
            })
            .send()
            .await
            .map_err(|source| ClusterError::Transport {
                operation: OP,
                source,
            })?;

        let init: InitResponse = Self::read_json(OP, response).await?;
        Ok(KeyBundle::from_parts(
            init.keys,
            init.keys_base64,
            shares,
            threshold,
            init.root_token,
        )?)
    }

    async fn unseal(&self, share: &str) -> Result<UnsealProgress, ClusterError> {
        const OP: &str = "unseal";

        let response = self
            .client
            .put(self.url(UNSEAL_PATH))
            .json(&UnsealRequest { key: share })
            .send()
            .await
            .map_err(|source| ClusterError::Transport {
                operation: OP,
                source,
            })?;

        Self::read_json(OP, response).await
    }
}
