//! Initialization and unseal controller
//!
//! The controller keeps no state between ticks. Every tick starts from a fresh
//! health snapshot and picks at most one action:
//!
//! | Phase          | Action                                             |
//! |----------------|----------------------------------------------------|
//! | uninitialized  | initialize and persist, if this replica may        |
//! | sealed         | read the bundle and submit shares until unsealed   |
//! | standby        | none                                               |
//! | active         | none                                               |
//!
//! A failing step ends the tick; the next tick re-evaluates from scratch.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vault_init_core::{ClusterPhase, InitSettings};
use vault_init_keystore::Keystore;

use crate::cluster::ClusterApi;
use crate::poller::HealthPoller;

/// Step of a tick that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStep {
    Poll,
    Initialize,
    Persist,
    Read,
    Unseal,
}

impl fmt::Display for TickStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            TickStep::Poll => "poll",
            TickStep::Initialize => "initialize",
            TickStep::Persist => "persist",
            TickStep::Read => "read",
            TickStep::Unseal => "unseal",
        };
        f.write_str(step)
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cluster initialized and the bundle persisted
    Initialized,
    /// Cluster uninitialized, but another replica is the initializer
    InitSkipped,
    Unsealed { shares_submitted: usize },
    /// Every stored share was accepted and the cluster is still sealed
    StillSealed { shares_submitted: usize },
    Standby,
    Active,
    Failed { step: TickStep, error: String },
}

impl TickOutcome {
    fn failed(step: TickStep, error: impl fmt::Display) -> Self {
        TickOutcome::Failed {
            step,
            error: error.to_string(),
        }
    }
}

pub struct Controller {
    poller: HealthPoller,
    cluster: Arc<dyn ClusterApi>,
    keystore: Arc<dyn Keystore>,
    settings: InitSettings,
}

impl Controller {
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        keystore: Arc<dyn Keystore>,
        settings: InitSettings,
    ) -> Self {
        Self {
            poller: HealthPoller::new(cluster.clone()),
            cluster,
            keystore,
            settings,
        }
    }

    pub fn keystore(&self) -> &Arc<dyn Keystore> {
        &self.keystore
    }

    /// Poll once and act on the result
    pub async fn tick(&self) -> TickOutcome {
        let status = match self.poller.poll().await {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Cluster state unknown, retrying next tick");
                return TickOutcome::failed(TickStep::Poll, e);
            }
        };

        let outcome = match status.phase() {
            ClusterPhase::Uninitialized => self.initialize().await,
            ClusterPhase::Sealed => self.unseal().await,
            ClusterPhase::Standby => {
                info!("Vault is unsealed and in standby mode");
                TickOutcome::Standby
            }
            ClusterPhase::Active => {
                debug!("Vault is initialized and unsealed");
                TickOutcome::Active
            }
        };

        debug!(?outcome, "Tick finished");
        outcome
    }

    async fn initialize(&self) -> TickOutcome {
        let policy = &self.settings.initializer;
        if !policy.should_initialize() {
            info!(
                initializer = policy.designated.as_deref().unwrap_or_default(),
                "Vault is not initialized; waiting for the designated initializer"
            );
            return TickOutcome::InitSkipped;
        }

        info!(
            shares = self.settings.secret_shares,
            threshold = self.settings.secret_threshold,
            "Vault is not initialized, initializing"
        );

        let bundle = match self
            .cluster
            .initialize(self.settings.secret_shares, self.settings.secret_threshold)
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(error = %e, "Initialization failed");
                return TickOutcome::failed(TickStep::Initialize, e);
            }
        };

        if let Err(e) = self.keystore.encrypt_and_write(&bundle).await {
            // Vault now holds keys that exist nowhere else
            error!(
                error = %e,
                backend = self.keystore.name(),
                location = %self.keystore.location(),
                "Vault was initialized but the key bundle could not be stored"
            );
            return TickOutcome::failed(TickStep::Persist, e);
        }

        info!(
            backend = self.keystore.name(),
            location = %self.keystore.location(),
            "Initialization complete"
        );
        TickOutcome::Initialized
    }

    async fn unseal(&self) -> TickOutcome {
        info!("Vault is sealed, unsealing");

        let bundle = match self.keystore.read_and_decrypt().await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!(error = %e, backend = self.keystore.name(), "Failed to read key bundle");
                return TickOutcome::failed(TickStep::Read, e);
            }
        };

        let mut submitted = 0;
        for share in bundle.shares() {
            match self.cluster.unseal(share).await {
                Ok(progress) => {
                    submitted += 1;
                    debug!(
                        submitted,
                        progress = progress.progress,
                        threshold = progress.threshold,
                        "Unseal share accepted"
                    );
                    if !progress.sealed {
                        info!(shares_submitted = submitted, "Unseal complete");
                        return TickOutcome::Unsealed {
                            shares_submitted: submitted,
                        };
                    }
                }
                Err(e) => {
                    error!(error = %e, submitted, "Unseal share rejected");
                    return TickOutcome::failed(TickStep::Unseal, e);
                }
            }
        }

        warn!(
            shares_submitted = submitted,
            "Vault is still sealed after every stored share"
        );
        TickOutcome::StillSealed {
            shares_submitted: submitted,
        }
    }
}
