// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-core
//!
//! The stable contract for WeftEnd.
//!
//! Every entity here is immutable, content-addressed, and canonical: digests
//! are computed over the canonical JSON of the object with the digest field
//! absent, and no object ever carries wall-clock time, host identity, or
//! anything that depends on map iteration order.
//!
//! If you only take one dependency, take this one.

/// Capture trees produced by format parsers and the examiner.
pub mod capture;
/// Process-wide configuration, read once.
pub mod config;
/// Evidence records and their identity law.
pub mod evidence;
/// Exit codes and user-visible failure formatting.
pub mod exit;
/// Gate receipts minted by market admission gates.
pub mod gate;
/// Validation issues with deterministic ordering.
pub mod issue;
/// Artifact kinds, grades, verdicts, tiers, and the other closed enums.
pub mod kinds;
/// Trust policies, evidence expressions, and capability grants.
pub mod policy;
/// The frozen reason-code registry and remedy mapping.
pub mod reason;
/// Mint receipts, safe-run receipts, report cards, operator receipts.
pub mod receipt;
/// Release manifests and runtime bundles.
pub mod release;
/// Shop stamps.
pub mod stamp;
/// Per-target view state for the baseline/compare loop.
pub mod view;

pub use capture::{CaptureEntry, CaptureTree};
pub use config::EnvConfig;
pub use evidence::{EvidenceRecord, EvidenceSubject, sort_evidence_set};
pub use gate::GateReceipt;
pub use issue::{Issue, sort_issues};
pub use kinds::{
    AcceptDecision, ArtifactKind, Bucket, CompareVerdict, ExecutionMode, GateDecision, Grade,
    ReleaseStatus, Tier, Verdict, WebLane,
};
pub use policy::{CapabilityGrant, CapabilityRequest, EvidenceExpr, RuleSelector, TrustPolicy, TrustRule};
pub use reason::{Remedy, UserFailure, codes};
pub use receipt::{
    CapAttempt, MintReceipt, OperatorReceipt, ProbeKind, ProbeOutcome, ProbeResult, ReportCard,
    SafeRunReceipt,
};
pub use release::{ManifestBody, ManifestSignature, ReleaseManifest, RuntimeBundle};
pub use stamp::ShopStamp;
pub use view::{RunKey, ViewState};

/// Current contract version string embedded in receipts.
pub const CONTRACT_VERSION: &str = "weftend/v1";

/// Errors from contract-level operations (canonicalization, digest laws).
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Canonical serialization failed.
    #[error(transparent)]
    Canon(#[from] weft_canon::CanonError),
    /// A digest field did not match its recomputed value.
    #[error("digest binding violated: stored {stored}, computed {computed}")]
    DigestMismatch {
        /// The digest stored on the object.
        stored: String,
        /// The digest recomputed from canonical bytes.
        computed: String,
    },
    /// A required digest field is absent.
    #[error("digest field is absent")]
    DigestAbsent,
}

/// Compute the digest of a serializable object with one field forced to null.
///
/// This is the single identity-law helper: `releaseId`, `evidenceId`,
/// `mintDigest`, `stampDigest`, and `receiptId` are all "digest of the
/// canonical object with the digest field absent", and absent collapses to
/// `null` under the canonical rules.
///
/// # Errors
///
/// Propagates canonicalization failures.
pub fn digest_with_field_nulled<T: serde::Serialize>(
    value: &T,
    field: &str,
) -> Result<String, ContractError> {
    let mut v = weft_canon::canonical_value(value)?;
    if let serde_json::Value::Object(map) = &mut v {
        map.insert(field.to_string(), serde_json::Value::Null);
    }
    Ok(weft_canon::sha256_digest(
        weft_canon::canonical_string(&v)?.as_bytes(),
    ))
}
