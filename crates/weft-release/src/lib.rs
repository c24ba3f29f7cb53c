// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-release
//!
//! Binds a release manifest to its bundle, its stored artifacts, its
//! evidence, and its pinned signing keys. Every failed invariant produces a
//! stable reason code; the overall outcome is `OK`, `UNVERIFIED`, or `MAYBE`
//! (structurally sound but signatures unchecked because no crypto port is
//! available).

/// The gated demo signer.
pub mod demo;
/// The on-disk release file set.
pub mod files;
/// Keys, the allowlist, and the crypto port.
pub mod keys;

pub use demo::{DemoCryptoError, DemoSigner};
pub use files::ReleaseFileSet;
pub use keys::{AllowlistedKey, CryptoPort, Ed25519Port, KeyAllowlist, PublicKey};

use std::collections::BTreeSet;
use weft_core::{EvidenceRecord, ReleaseManifest, ReleaseStatus, RuntimeBundle, codes};
use weft_store::{ArtifactStore, StoreError};

/// Outcome of verifying a release triad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVerification {
    /// The overall outcome.
    pub status: ReleaseStatus,
    /// Sorted unique reason codes; empty exactly when `status` is `OK`.
    pub reason_codes: Vec<String>,
}

impl ReleaseVerification {
    /// Returns `true` when every invariant held.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ReleaseStatus::Ok
    }
}

/// Verify a release manifest against its bundle, store, evidence, and keys.
///
/// All invariants are checked and all reasons collected before the verdict;
/// reversing the check order cannot change the outcome set.
pub fn verify_release(
    manifest: &ReleaseManifest,
    bundle: &RuntimeBundle,
    store: &dyn ArtifactStore,
    evidence: &[EvidenceRecord],
    allowlist: &KeyAllowlist,
    port: Option<&dyn CryptoPort>,
) -> ReleaseVerification {
    let mut reasons: Vec<String> = Vec::new();
    let mut signatures_unchecked = false;

    // Identity law.
    if manifest.verify_id().is_err() {
        reasons.push(codes::RELEASE_MANIFEST_INVALID.to_string());
    }

    // Signatures against the pinned allowlist.
    if manifest.signatures.is_empty() {
        reasons.push(codes::TRUST_SIGNATURE_REQUIRED.to_string());
    } else {
        match port {
            None => signatures_unchecked = true,
            Some(port) => match weft_canon::canonical_json(&manifest.manifest_body) {
                Ok(message) => {
                    for signature in &manifest.signatures {
                        let verified = allowlist
                            .find(&signature.key_id, &signature.algo)
                            .and_then(|k| PublicKey::from_hex(&k.public_key_hex).ok())
                            .is_some_and(|key| {
                                port.verify(&key, message.as_bytes(), &signature.sig)
                            });
                        if !verified {
                            reasons.push(codes::RELEASE_SIGNATURE_BAD.to_string());
                        }
                    }
                }
                Err(_) => reasons.push(codes::RELEASE_MANIFEST_INVALID.to_string()),
            },
        }
    }

    // Plan binding.
    if manifest.manifest_body.plan_digest != bundle.plan_digest {
        reasons.push(codes::RELEASE_PLANDIGEST_MISMATCH.to_string());
    }

    // Block set binding.
    let manifest_blocks: BTreeSet<&String> = manifest.manifest_body.blocks.iter().collect();
    let bundle_blocks: BTreeSet<&String> = bundle.blocks.iter().collect();
    if manifest_blocks != bundle_blocks {
        reasons.push(codes::RELEASE_BLOCKSET_MISMATCH.to_string());
    }

    // Declared artifacts must exist at their digest keys with sound bytes.
    for digest in &manifest.manifest_body.artifact_digests {
        match store.get(digest) {
            Ok(_) => {}
            Err(StoreError::DigestMismatch { .. }) => {
                reasons.push(codes::ARTIFACT_DIGEST_MISMATCH.to_string());
            }
            Err(_) => reasons.push(codes::ARTIFACT_MISSING.to_string()),
        }
    }

    // Bound evidence must resolve to validated records.
    for wanted in &manifest.manifest_body.evidence_digests {
        let resolved = evidence.iter().any(|record| {
            record.evidence_id.as_deref() == Some(wanted.as_str())
                && record.verify_id().is_ok()
        });
        if !resolved {
            reasons.push(codes::EVIDENCE_DIGEST_MISMATCH.to_string());
        }
    }

    weft_canon::sort::sort_reason_codes(&mut reasons);

    let status = if !reasons.is_empty() {
        ReleaseStatus::Unverified
    } else if signatures_unchecked {
        reasons.push(codes::RELEASE_SIGNATURE_UNCHECKED.to_string());
        ReleaseStatus::Maybe
    } else {
        ReleaseStatus::Ok
    };

    if status != ReleaseStatus::Ok {
        tracing::warn!(?status, ?reasons, "release verification did not pass clean");
    }

    ReleaseVerification {
        status,
        reason_codes: reasons,
    }
}
