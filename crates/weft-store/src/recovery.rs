// SPDX-License-Identifier: MIT OR Apache-2.0

//! The strict recovery lane.
//!
//! Recovery restores only bytes that satisfy strict verification: the
//! candidate must hash to the expected digest, parse as a runtime bundle,
//! and match the plan digest, the block set, and the path digest when the
//! plan pins one. A successful recovery is scarred into Tartarus and is
//! never recorded as clean. Recovery never edits the release manifest.

use crate::{ArtifactStore, StoreError, safe_digest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use weft_core::{RuntimeBundle, codes};
use weft_tartarus::TartarusLog;

/// What the caller expects the recovered artifact to be.
#[derive(Debug, Clone)]
pub struct RecoveryPlan {
    /// Digest the restored bytes must hash to. `None` means the source is
    /// unknown and recovery refuses to run.
    pub expected_digest: Option<String>,
    /// Plan digest the candidate bundle must carry.
    pub plan_digest: String,
    /// Block set the candidate bundle must carry, sorted.
    pub blocks: Vec<String>,
    /// Path digest the candidate must carry, when the plan pins one.
    pub path_digest: Option<String>,
}

/// Where recovery candidates come from.
pub trait BundleCache {
    /// Fetch the raw bytes stored under a bundle key, if any.
    fn bundle_bytes(&self, key: &str) -> Option<Vec<u8>>;
}

/// In-memory candidate cache for engines and tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store candidate bytes under a bundle key.
    pub fn insert(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(key.into(), bytes);
    }
}

impl BundleCache for MemoryCache {
    fn bundle_bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }
}

/// Directory-backed candidate cache. Keys map through the safe-digest
/// grammar to file names.
#[derive(Debug)]
pub struct FsCache {
    root: PathBuf,
}

impl FsCache {
    /// Open a cache rooted at `root`.
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(safe_digest(key))
    }
}

impl BundleCache for FsCache {
    fn bundle_bytes(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.key_path(key)).ok()
    }
}

/// The bundle key recovery looks for. There is no release-id fallback.
#[must_use]
pub fn bundle_key(expected_digest: &str) -> String {
    format!("bundle_{expected_digest}.json")
}

/// The receipt a recovery attempt writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RecoveryReceipt {
    /// The digest recovery was asked to restore.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_digest: Option<String>,
    /// The bundle key that was probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_key: Option<String>,
    /// Whether verified bytes were restored.
    pub recovered: bool,
    /// Sorted unique reason codes.
    pub reason_codes: Vec<String>,
}

/// The outcome of a recovery attempt.
#[derive(Debug, Clone)]
pub struct RecoveryOutcome {
    /// Whether verified bytes were restored into the store.
    pub recovered: bool,
    /// Sorted unique reason codes. A successful recovery always carries
    /// both `ARTIFACT_DIGEST_MISMATCH` and `ARTIFACT_RECOVERED`.
    pub reason_codes: Vec<String>,
    /// The receipt to persist.
    pub receipt: RecoveryReceipt,
}

/// Attempt a strict recovery.
///
/// On success the verified bytes are written back into `store` and a scar
/// with `{ARTIFACT_DIGEST_MISMATCH, ARTIFACT_RECOVERED}` is appended to
/// `log`, bound to the recovered digest.
pub fn recover(
    plan: &RecoveryPlan,
    cache: &dyn BundleCache,
    store: &dyn ArtifactStore,
    log: &mut TartarusLog,
) -> RecoveryOutcome {
    let Some(expected) = plan.expected_digest.as_deref() else {
        return failure(None, None, vec![codes::RECOVERY_SOURCE_UNKNOWN.to_string()]);
    };
    let key = bundle_key(expected);

    let Some(bytes) = cache.bundle_bytes(&key) else {
        return failure(
            Some(expected),
            Some(&key),
            vec![codes::RECOVERY_CANDIDATE_INVALID.to_string()],
        );
    };

    let observed = weft_canon::sha256_digest(&bytes);
    if observed != expected {
        return failure(
            Some(expected),
            Some(&key),
            vec![codes::RECOVERY_CANDIDATE_INVALID.to_string()],
        );
    }

    let bundle: RuntimeBundle = match serde_json::from_slice(&bytes) {
        Ok(b) => b,
        Err(_) => {
            return failure(
                Some(expected),
                Some(&key),
                vec![codes::RECOVERY_CANDIDATE_INVALID.to_string()],
            );
        }
    };

    let mut mismatch = bundle.plan_digest != plan.plan_digest;
    let mut candidate_blocks = bundle.blocks.clone();
    candidate_blocks.sort();
    let mut expected_blocks = plan.blocks.clone();
    expected_blocks.sort();
    mismatch |= candidate_blocks != expected_blocks;
    if let Some(pinned) = plan.path_digest.as_deref() {
        mismatch |= bundle.path_digest.as_deref() != Some(pinned);
    }
    if mismatch {
        return failure(
            Some(expected),
            Some(&key),
            vec![codes::RECOVERY_CANDIDATE_INVALID.to_string()],
        );
    }

    if let Err(e) = store.put(&bytes) {
        return failure(Some(expected), Some(&key), vec![e.code().to_string()]);
    }

    let reason_codes = weft_canon::sort::sorted_reason_codes([
        codes::ARTIFACT_DIGEST_MISMATCH,
        codes::ARTIFACT_RECOVERED,
    ]);
    log.append("artifact.recovered", expected, reason_codes.clone());
    tracing::warn!(%expected, "artifact recovered from verified bundle");

    RecoveryOutcome {
        recovered: true,
        reason_codes: reason_codes.clone(),
        receipt: RecoveryReceipt {
            expected_digest: Some(expected.to_string()),
            bundle_key: Some(key),
            recovered: true,
            reason_codes,
        },
    }
}

/// Persist a recovery receipt as `recovery_receipt_<safeDigest>.json`.
///
/// # Errors
///
/// Returns [`StoreError::Io`] when the receipt cannot be written.
pub fn write_recovery_receipt(
    dir: &Path,
    receipt: &RecoveryReceipt,
) -> Result<PathBuf, StoreError> {
    std::fs::create_dir_all(dir)?;
    let stem = receipt
        .expected_digest
        .as_deref()
        .map_or_else(|| "unknown".to_string(), safe_digest);
    let path = dir.join(format!("recovery_receipt_{stem}.json"));
    let json = serde_json::to_string_pretty(receipt)
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
    std::fs::write(&path, json)?;
    Ok(path)
}

fn failure(
    expected: Option<&str>,
    key: Option<&str>,
    reasons: Vec<String>,
) -> RecoveryOutcome {
    let reason_codes = weft_canon::sort::sorted_reason_codes(reasons);
    RecoveryOutcome {
        recovered: false,
        reason_codes: reason_codes.clone(),
        receipt: RecoveryReceipt {
            expected_digest: expected.map(str::to_string),
            bundle_key: key.map(str::to_string),
            recovered: false,
            reason_codes,
        },
    }
}
