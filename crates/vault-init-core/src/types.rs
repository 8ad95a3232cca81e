//! Key bundle, cluster status and storage location types

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Object name of the full bundle for backends without client-side envelopes
pub const UNSEAL_KEYS_OBJECT: &str = "unseal-keys.json";

/// Object name of the root token for backends without client-side envelopes
pub const ROOT_TOKEN_OBJECT: &str = "root-token";

/// Object name of the KMS-encrypted full bundle
pub const UNSEAL_KEYS_OBJECT_ENC: &str = "unseal-keys.json.enc";

/// Object name of the KMS-encrypted root token
pub const ROOT_TOKEN_OBJECT_ENC: &str = "root-token.enc";

/// Hex length of one Vault unseal share (32-byte key plus the x coordinate)
pub const VAULT_SHARE_HEX_LEN: usize = 66;

/// Base64 length of one Vault unseal share
pub const VAULT_SHARE_BASE64_LEN: usize = 44;

/// Longest root token accounted for when sizing a bundle
pub const MAX_ROOT_TOKEN_LEN: usize = 256;

/// Upper bound on the serialized size of a bundle produced by Vault
///
/// Counts both share encodings, the two counters at three digits each and a
/// root token of [`MAX_ROOT_TOKEN_LEN`].
pub fn max_bundle_json_len(shares: u32) -> usize {
    const ENVELOPE: usize = r#"{"keys":[],"keys_base64":[],"secret_shares":,"secret_threshold":,"root_token":""}"#
        .len();
    let shares = shares as usize;
    let per_share = (VAULT_SHARE_HEX_LEN + 2) + (VAULT_SHARE_BASE64_LEN + 2);
    let separators = 2 * shares.saturating_sub(1);

    ENVELOPE + 3 + 3 + MAX_ROOT_TOKEN_LEN + shares * per_share + separators
}

/// Violations of the key bundle invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BundleError {
    #[error("secret threshold must be at least 1")]
    ZeroThreshold,

    #[error("secret threshold {threshold} exceeds share count {shares}")]
    ThresholdExceedsShares { threshold: u32, shares: u32 },

    #[error("bundle declares {declared} shares but holds {actual}")]
    ShareCountMismatch { declared: u32, actual: usize },

    #[error("bundle holds {hex} hex keys but {shares} shares")]
    HexKeyCountMismatch { hex: usize, shares: usize },

    #[error("root token is empty")]
    EmptyRootToken,
}

/// The secret material produced by a single successful initialization
///
/// Serialized with Vault's init response field names plus the requested
/// share count and threshold. `keys_base64` is the ordered share list used
/// for unsealing.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "KeyBundleRecord")]
pub struct KeyBundle {
    keys: Vec<String>,
    keys_base64: Vec<String>,
    secret_shares: u32,
    secret_threshold: u32,
    root_token: SecretString,
}

#[derive(Deserialize)]
struct KeyBundleRecord {
    #[serde(default)]
    keys: Vec<String>,
    keys_base64: Vec<String>,
    secret_shares: u32,
    secret_threshold: u32,
    root_token: SecretString,
}

impl TryFrom<KeyBundleRecord> for KeyBundle {
    type Error = BundleError;

    fn try_from(record: KeyBundleRecord) -> Result<Self, Self::Error> {
        KeyBundle::from_parts(
            record.keys,
            record.keys_base64,
            record.secret_shares,
            record.secret_threshold,
            record.root_token,
        )
    }
}

impl KeyBundle {
    /// Build a bundle from base64 shares only; the share count is the number of shares
    pub fn new(
        shares: Vec<String>,
        share_threshold: u32,
        root_token: impl Into<SecretString>,
    ) -> Result<Self, BundleError> {
        let share_count = shares.len() as u32;
        Self::from_parts(Vec::new(), shares, share_count, share_threshold, root_token)
    }

    /// Build a bundle and check every invariant
    ///
    /// `keys` holds the hex form of the shares and may be empty.
    pub fn from_parts(
        keys: Vec<String>,
        keys_base64: Vec<String>,
        share_count: u32,
        share_threshold: u32,
        root_token: impl Into<SecretString>,
    ) -> Result<Self, BundleError> {
        let root_token = root_token.into();

        if share_threshold == 0 {
            return Err(BundleError::ZeroThreshold);
        }
        if share_threshold > share_count {
            return Err(BundleError::ThresholdExceedsShares {
                threshold: share_threshold,
                shares: share_count,
            });
        }
        if keys_base64.len() != share_count as usize {
            return Err(BundleError::ShareCountMismatch {
                declared: share_count,
                actual: keys_base64.len(),
            });
        }
        if !keys.is_empty() && keys.len() != keys_base64.len() {
            return Err(BundleError::HexKeyCountMismatch {
                hex: keys.len(),
                shares: keys_base64.len(),
            });
        }
        if root_token.is_empty() {
            return Err(BundleError::EmptyRootToken);
        }

        Ok(Self {
            keys,
            keys_base64,
            secret_shares: share_count,
            secret_threshold: share_threshold,
            root_token,
        })
    }

    /// Base64 unseal shares in submission order
    pub fn shares(&self) -> &[String] {
        &self.keys_base64
    }

    /// Hex unseal shares, empty when the producer did not supply them
    pub fn hex_shares(&self) -> &[String] {
        &self.keys
    }

    pub fn share_count(&self) -> u32 {
        self.secret_shares
    }

    pub fn share_threshold(&self) -> u32 {
        self.secret_threshold
    }

    pub fn root_token(&self) -> &SecretString {
        &self.root_token
    }

    /// Serialize the full bundle
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize and validate a full bundle
    pub fn from_json(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }

    /// Serialize the root token alone, as a JSON string
    pub fn root_token_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.root_token)
    }
}

impl fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBundle")
            .field("secret_shares", &self.secret_shares)
            .field("secret_threshold", &self.secret_threshold)
            .finish_non_exhaustive()
    }
}

/// Snapshot returned by one health poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub initialized: bool,
    pub sealed: bool,
    pub standby: bool,
}

/// What the controller should do, derived from a status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterPhase {
    Uninitialized,
    Sealed,
    Standby,
    Active,
}

impl ClusterStatus {
    pub fn phase(&self) -> ClusterPhase {
        if !self.initialized {
            ClusterPhase::Uninitialized
        } else if self.sealed {
            ClusterPhase::Sealed
        } else if self.standby {
            ClusterPhase::Standby
        } else {
            ClusterPhase::Active
        }
    }
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterPhase::Uninitialized => write!(f, "uninitialized"),
            ClusterPhase::Sealed => write!(f, "sealed"),
            ClusterPhase::Standby => write!(f, "standby"),
            ClusterPhase::Active => write!(f, "active"),
        }
    }
}

/// Where a keystore backend puts the bundle and the root token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    /// Bucket name, `None` for backends addressed by name alone
    pub bucket: Option<String>,
    /// Path prefix, stored without a trailing separator
    pub prefix: String,
    pub bundle_object: &'static str,
    pub root_token_object: &'static str,
}

impl StorageLocation {
    pub fn new(
        bucket: Option<String>,
        prefix: &str,
        bundle_object: &'static str,
        root_token_object: &'static str,
    ) -> Self {
        Self {
            bucket,
            prefix: prefix.trim_end_matches('/').to_string(),
            bundle_object,
            root_token_object,
        }
    }

    /// Full key of the bundle object
    pub fn bundle_key(&self) -> String {
        self.join(self.bundle_object)
    }

    /// Full key of the root token object
    pub fn root_token_key(&self) -> String {
        self.join(self.root_token_object)
    }

    fn join(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bucket {
            Some(bucket) if self.prefix.is_empty() => write!(f, "{}", bucket),
            Some(bucket) => write!(f, "{}/{}", bucket, self.prefix),
            None => write!(f, "{}", self.prefix),
        }
    }
}
