//! Cluster health polling

use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use vault_init_core::ClusterStatus;

use crate::cluster::{ClusterApi, ClusterError};

/// The cluster state is unknown for this tick
#[derive(Error, Debug)]
#[error("health check failed: {0}")]
pub struct PollError(#[from] pub ClusterError);

/// Reads one status snapshot per call
#[derive(Clone)]
pub struct HealthPoller {
    cluster: Arc<dyn ClusterApi>,
}

impl HealthPoller {
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Errors are never translated into a cluster state
    pub async fn poll(&self) -> Result<ClusterStatus, PollError> {
        let status = self.cluster.health().await?;
        debug!(phase = %status.phase(), "Polled cluster health");
        Ok(status)
    }
}
