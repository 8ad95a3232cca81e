//! AWS credential bootstrap
//!
//! Containers often start before their credentials are injected (IRSA token
//! files, sidecars writing profiles, instance metadata warming up). The probe
//! below distinguishes that race, reported by the SDK as "no providers in
//! chain", from real misconfiguration: the former is retried on a fixed
//! interval forever, the latter is returned immediately.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::error::CredentialsError;
use aws_credential_types::provider::ProvideCredentials;
use thiserror::Error;
use tracing::{debug, info};
use vault_init_core::retry::{ClosurePredicate, RetryExecutorBuilder, RetryPolicy, TracingObserver};
use vault_init_core::AwsSettings;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The provider chain found nothing yet
    #[error("no valid AWS credential providers in chain: {0}")]
    NotYetAvailable(String),

    /// A provider exists but failed
    #[error("failed to resolve AWS credentials: {0}")]
    Fatal(String),
}

impl CredentialError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CredentialError::NotYetAvailable(_))
    }
}

impl From<CredentialsError> for CredentialError {
    fn from(err: CredentialsError) -> Self {
        let message = aws_sdk_s3::error::DisplayErrorContext(&err).to_string();
        match err {
            CredentialsError::CredentialsNotLoaded(_) => CredentialError::NotYetAvailable(message),
            _ => CredentialError::Fatal(message),
        }
    }
}

/// Builds a client session and checks that credentials resolve
#[async_trait]
pub trait CredentialProbe: Send + Sync {
    type Session: Send;

    async fn probe(&self) -> Result<Self::Session, CredentialError>;
}

/// Probe backed by the default AWS provider chain
#[derive(Debug, Clone)]
pub struct SdkCredentialProbe {
    settings: AwsSettings,
}

impl SdkCredentialProbe {
    pub fn new(settings: AwsSettings) -> Self {
        Self { settings }
    }

    async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &self.settings.endpoint {
            debug!("Using custom AWS endpoint: {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }
        loader.load().await
    }
}

#[async_trait]
impl CredentialProbe for SdkCredentialProbe {
    type Session = SdkConfig;

    async fn probe(&self) -> Result<SdkConfig, CredentialError> {
        // A fresh session per attempt so newly injected credentials are seen
        let sdk_config = self.load().await;
        let provider = sdk_config.credentials_provider().ok_or_else(|| {
            CredentialError::NotYetAvailable("no credentials provider configured".to_string())
        })?;

        provider.provide_credentials().await?;
        Ok(sdk_config)
    }
}

/// Retry policy for credential bootstrap: fixed interval, no attempt cap
pub fn credential_retry_policy(settings: &AwsSettings) -> RetryPolicy {
    RetryPolicy::unbounded(settings.credentials_retry)
}

/// Probe until credentials resolve or a non-retryable error occurs
pub async fn wait_for_credentials<P>(
    probe: &P,
    policy: RetryPolicy,
) -> Result<P::Session, CredentialError>
where
    P: CredentialProbe,
{
    let executor = RetryExecutorBuilder::new()
        .with_policy(policy)
        .with_predicate(ClosurePredicate::new(|err: &CredentialError| {
            err.is_retryable()
        }))
        .with_observer(TracingObserver::new("aws-credentials"))
        .build();

    let session = executor
        .execute(|| probe.probe())
        .await
        .map_err(|err| err.into_source())?;

    info!("AWS credentials resolved");
    Ok(session)
}

/// Resolve an AWS session for the configured endpoint, waiting out cold starts
pub async fn resolve_session(settings: &AwsSettings) -> Result<SdkConfig, CredentialError> {
    let probe = SdkCredentialProbe::new(settings.clone());
    wait_for_credentials(&probe, credential_retry_policy(settings)).await
}
