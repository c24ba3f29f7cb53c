// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-store
//!
//! Content-addressed artifact bytes. Keys are SHA-256 digests, writes are
//! idempotent by key, and every read re-hashes the stored bytes. Bytes that
//! no longer hash to their key are tamper, not data.

/// File-backed store with atomic writes.
pub mod fs;
/// The strict recovery lane.
pub mod recovery;

pub use fs::FsStore;
pub use recovery::{BundleCache, FsCache, MemoryCache, RecoveryOutcome, RecoveryPlan, recover};

use std::collections::BTreeMap;
use std::sync::Mutex;
use weft_core::codes;

/// Errors from store reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No bytes exist at the requested digest key.
    #[error("[ARTIFACT_MISSING] no artifact stored at {digest}")]
    Missing {
        /// The requested key.
        digest: String,
    },
    /// Stored bytes no longer hash to their key. Callers treat this as
    /// tamper.
    #[error("[ARTIFACT_DIGEST_MISMATCH] artifact at {digest} rehashes to {observed}")]
    DigestMismatch {
        /// The key the bytes were stored under.
        digest: String,
        /// What the bytes hash to now.
        observed: String,
    },
    /// The backing medium failed.
    #[error("artifact store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// The stable reason code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => codes::ARTIFACT_MISSING,
            Self::DigestMismatch { .. } => codes::ARTIFACT_DIGEST_MISMATCH,
            Self::Io(_) => codes::ARTIFACT_MISSING,
        }
    }
}

/// A content-addressed byte store.
pub trait ArtifactStore: Send + Sync {
    /// Store bytes, returning their digest key. Idempotent by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the backing medium fails.
    fn put(&self, bytes: &[u8]) -> Result<String, StoreError>;

    /// Fetch and re-verify bytes by digest key.
    ///
    /// # Errors
    ///
    /// [`StoreError::Missing`] when absent, [`StoreError::DigestMismatch`]
    /// when the stored bytes no longer hash to the key.
    fn get(&self, digest: &str) -> Result<Vec<u8>, StoreError>;

    /// Returns `true` when a key exists (without verifying its bytes).
    fn contains(&self, digest: &str) -> bool;
}

/// In-memory store for engines and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the bytes at a key without re-keying them.
    ///
    /// Exists for tamper tests: it breaks the digest invariant on purpose.
    pub fn corrupt(&self, digest: &str, bytes: Vec<u8>) {
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .insert(digest.to_string(), bytes);
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let digest = weft_canon::sha256_digest(bytes);
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .entry(digest.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(digest)
    }

    fn get(&self, digest: &str) -> Result<Vec<u8>, StoreError> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        let bytes = entries.get(digest).ok_or_else(|| StoreError::Missing {
            digest: digest.to_string(),
        })?;
        let observed = weft_canon::sha256_digest(bytes);
        if observed != digest {
            return Err(StoreError::DigestMismatch {
                digest: digest.to_string(),
                observed,
            });
        }
        Ok(bytes.clone())
    }

    fn contains(&self, digest: &str) -> bool {
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .contains_key(digest)
    }
}

/// Map a digest into the safe on-disk grammar `[A-Za-z0-9._-]`.
#[must_use]
pub fn safe_digest(digest: &str) -> String {
    digest
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
