//! Shared fakes for controller and driver tests
//!
//! In your test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

pub mod mock_server;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vault_init::{ClusterApi, ClusterError, Controller, UnsealProgress};
use vault_init_core::types::{ROOT_TOKEN_OBJECT, UNSEAL_KEYS_OBJECT};
use vault_init_core::{ClusterStatus, InitSettings, InitializerPolicy, KeyBundle, StorageLocation};
use vault_init_keystore::{Keystore, KeystoreError, Result as KeystoreResult};

pub const ROOT_TOKEN: &str = "hvs.simulated-root";

#[derive(Debug, Default)]
struct SimState {
    initialized: bool,
    sealed: bool,
    standby: bool,
    threshold: u32,
    shares: Vec<String>,
    progress: u32,
    init_calls: usize,
    health_calls: usize,
    submitted: Vec<String>,
    failing_polls: usize,
    fail_unseal_at: Option<usize>,
    scripted_seals: Option<VecDeque<bool>>,
}

/// In-process stand-in for a Vault server
///
/// Unseals once `threshold` distinct issued shares have been submitted,
/// unless a scripted sequence of `sealed` responses is set.
#[derive(Debug, Default)]
pub struct SimulatedVault {
    state: Mutex<SimState>,
}

impl SimulatedVault {
    pub fn uninitialized() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sealed(threshold: u32, shares: &[&str]) -> Arc<Self> {
        let vault = Self::default();
        {
            let mut state = vault.state.lock().unwrap();
            state.initialized = true;
            state.sealed = true;
            state.threshold = threshold;
            state.shares = shares.iter().map(|s| s.to_string()).collect();
        }
        Arc::new(vault)
    }

    pub fn active() -> Arc<Self> {
        let vault = Self::sealed(1, &["k"]);
        vault.state.lock().unwrap().sealed = false;
        vault
    }

    pub fn set_standby(&self, standby: bool) {
        self.state.lock().unwrap().standby = standby;
    }

    /// Simulate a restart: sealed again, progress reset
    pub fn reseal(&self) {
        let mut state = self.state.lock().unwrap();
        state.sealed = true;
        state.progress = 0;
    }

    pub fn fail_next_polls(&self, count: usize) {
        self.state.lock().unwrap().failing_polls = count;
    }

    /// Reject the submission with this zero-based index
    pub fn fail_unseal_at(&self, index: usize) {
        self.state.lock().unwrap().fail_unseal_at = Some(index);
    }

    pub fn script_seal_responses(&self, sealed: &[bool]) {
        self.state.lock().unwrap().scripted_seals = Some(sealed.iter().copied().collect());
    }

    pub fn init_calls(&self) -> usize {
        self.state.lock().unwrap().init_calls
    }

    pub fn health_calls(&self) -> usize {
        self.state.lock().unwrap().health_calls
    }

    pub fn submitted(&self) -> Vec<String> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().unwrap().sealed
    }
}

#[async_trait]
impl ClusterApi for SimulatedVault {
    async fn health(&self) -> Result<ClusterStatus, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.health_calls += 1;
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(ClusterError::Decode {
                operation: "health",
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(ClusterStatus {
            initialized: state.initialized,
            sealed: state.sealed,
            standby: state.standby,
        })
    }

    async fn initialize(&self, shares: u32, threshold: u32) -> Result<KeyBundle, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.init_calls += 1;
        if state.initialized {
            return Err(ClusterError::Status {
                operation: "init",
                status: 400,
                errors: vec!["Vault is already initialized".to_string()],
            });
        }

        let keys: Vec<String> = (0..shares).map(|i| format!("share-{}", i)).collect();
        state.initialized = true;
        state.sealed = true;
        state.threshold = threshold;
        state.shares = keys.clone();

        Ok(KeyBundle::new(keys, threshold, ROOT_TOKEN)?)
    }

    async fn unseal(&self, share: &str) -> Result<UnsealProgress, ClusterError> {
        let mut state = self.state.lock().unwrap();
        let index = state.submitted.len();
        state.submitted.push(share.to_string());

        if state.fail_unseal_at == Some(index) {
            return Err(ClusterError::Status {
                operation: "unseal",
                status: 400,
                errors: vec!["invalid key".to_string()],
            });
        }

        if let Some(script) = state.scripted_seals.as_mut() {
            let sealed = script.pop_front().unwrap_or(true);
            state.sealed = sealed;
        } else if state.shares.iter().any(|s| s == share) {
            state.progress += 1;
            if state.progress >= state.threshold {
                state.sealed = false;
                state.progress = 0;
            }
        }

        Ok(UnsealProgress {
            sealed: state.sealed,
            threshold: state.threshold,
            progress: state.progress,
        })
    }
}

/// Write-once keystore held in memory
#[derive(Debug)]
pub struct MemoryKeystore {
    bundle: Mutex<Option<KeyBundle>>,
    location: StorageLocation,
    writes: AtomicUsize,
    reads: AtomicUsize,
    fail_writes: AtomicBool,
    closed: AtomicBool,
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self {
            bundle: Mutex::new(None),
            location: StorageLocation::new(None, "memory", UNSEAL_KEYS_OBJECT, ROOT_TOKEN_OBJECT),
            writes: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }
}

impl MemoryKeystore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_bundle(bundle: KeyBundle) -> Arc<Self> {
        let keystore = Self::default();
        *keystore.bundle.lock().unwrap() = Some(bundle);
        Arc::new(keystore)
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Option<KeyBundle> {
        self.bundle.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Keystore for MemoryKeystore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn encrypt_and_write(&self, bundle: &KeyBundle) -> KeystoreResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KeystoreError::storage(
                "memory put",
                self.location.bundle_key(),
                "AccessDenied",
            ));
        }

        let mut stored = self.bundle.lock().unwrap();
        if stored.is_some() {
            return Err(KeystoreError::AlreadyExists {
                key: self.location.bundle_key(),
            });
        }
        *stored = Some(bundle.clone());
        Ok(())
    }

    async fn read_and_decrypt(&self) -> KeystoreResult<KeyBundle> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.bundle
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| KeystoreError::NotFound {
                key: self.location.bundle_key(),
            })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn init_settings(shares: u32, threshold: u32, policy: InitializerPolicy) -> InitSettings {
    InitSettings {
        secret_shares: shares,
        secret_threshold: threshold,
        initializer: policy,
    }
}

pub fn controller(
    vault: &Arc<SimulatedVault>,
    keystore: &Arc<MemoryKeystore>,
    settings: InitSettings,
) -> Controller {
    Controller::new(vault.clone(), keystore.clone(), settings)
}

pub fn bundle_of(shares: &[&str], threshold: u32) -> KeyBundle {
    KeyBundle::new(
        shares.iter().map(|s| s.to_string()).collect(),
        threshold,
        ROOT_TOKEN,
    )
    .expect("valid test bundle")
}
