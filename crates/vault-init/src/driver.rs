//! Process driver: startup, the check loop and shutdown

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use vault_init_core::Config;
use vault_init_keystore::build_keystore;

use crate::cluster::VaultHttpClient;
use crate::controller::Controller;

/// Run until SIGINT or SIGTERM
pub async fn run(config: Config) -> Result<()> {
    let policy = &config.init.initializer;
    if policy.designated.is_some() && policy.replica.is_none() {
        warn!(
            "INITIALIZER_ID is set but this replica has no identity (REPLICA_ID/HOSTNAME); \
             it will never initialize Vault"
        );
    }

    info!(
        vault = %config.vault.address,
        backend = %config.keystore.backend(),
        interval_secs = config.check_interval.as_secs(),
        "Starting vault-init"
    );

    let cluster = Arc::new(VaultHttpClient::new(&config.vault).context("Failed to create Vault client")?);

    // Credential bootstrap may wait indefinitely
    let keystore = tokio::select! {
        keystore = build_keystore(&config.keystore, &config.aws) => {
            keystore.context("Failed to set up keystore")?
        }
        _ = shutdown_signal() => {
            info!("Shutdown requested before the keystore was ready");
            return Ok(());
        }
    };

    let controller = Controller::new(cluster, keystore, config.init.clone());
    let ticks = run_loop(&controller, config.check_interval, shutdown_signal()).await;

    controller.keystore().close().await;
    info!(ticks, "Shutting down");
    Ok(())
}

/// Tick once per interval until `shutdown` resolves
///
/// The first tick happens one full interval after start. A tick in progress
/// is finished before shutdown is observed. Returns the number of ticks run.
pub async fn run_loop<F>(controller: &Controller, interval: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticks = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(interval) => {
                controller.tick().await;
                ticks += 1;
            }
        }
    }

    ticks
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
