//! vault-init - Vault initialization and unseal automation
//!
//! Watches a Vault server, initializes it once, stores the generated key
//! bundle in an encrypted keystore and unseals the server whenever it comes
//! back sealed.
//!
//! - [`cluster`]: the Vault `sys` API client
//! - [`poller`]: health snapshots
//! - [`controller`]: the per-tick decision logic
//! - [`driver`]: the timer loop and signal handling

pub mod cli;
pub mod cluster;
pub mod controller;
pub mod driver;
pub mod poller;

pub use cluster::{ClusterApi, ClusterError, UnsealProgress, VaultHttpClient};
pub use controller::{Controller, TickOutcome, TickStep};
pub use poller::{HealthPoller, PollError};
