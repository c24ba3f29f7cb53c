// SPDX-License-Identifier: MIT OR Apache-2.0

//! Receipts.
//!
//! A mint receipt says *what an artifact is* and *what it attempted to do*
//! under denial. It carries no timestamps, no host identity, and no unbounded
//! strings; identity is the `mintDigest` computed with the digest field
//! absent. The safe-run receipt wraps a mint with the policy binding and host
//! truth used by the compare loop.

use crate::ContractError;
use crate::kinds::{ArtifactKind, Bucket, CompareVerdict, Grade, WebLane};
use crate::reason::{Remedy, UserFailure};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// The probe families the examiner runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ProbeKind {
    /// Instantiate the declared entry under strict defaults.
    LoadOnly,
    /// Replay a bounded deterministic interaction script.
    InteractionScript,
}

/// How a probe concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeOutcome {
    /// The probe ran to its bounded end.
    Completed,
    /// Execution was withheld for this artifact kind.
    Withheld,
    /// The probe does not apply to this artifact.
    NotApplicable,
}

/// One capability attempt observed during a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CapAttempt {
    /// The capability the artifact attempted.
    pub cap_id: String,
    /// Whether the kernel allowed it.
    pub allowed: bool,
    /// Denial reasons, sorted and unique; empty when allowed.
    pub reason_codes: Vec<String>,
}

/// The result of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProbeResult {
    /// Which probe ran.
    pub kind: ProbeKind,
    /// How it concluded.
    pub outcome: ProbeOutcome,
    /// Capability attempts in arrival order.
    pub attempted: Vec<CapAttempt>,
    /// Probe-level reasons, sorted and unique.
    pub reason_codes: Vec<String>,
}

/// MintReceipt v1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MintReceipt {
    /// Receipt schema tag.
    pub schema: String,
    /// What classification decided the artifact is.
    pub artifact_kind: ArtifactKind,
    /// FNV-1a fingerprint over the normalized subset (`fnv1a32:` prefixed).
    pub artifact_fingerprint: String,
    /// SHA-256 digest of the artifact's canonical bytes (`sha256:` prefixed).
    pub artifact_digest: String,
    /// Digest of the canonical capture tree.
    pub capture_digest: String,
    /// Per-kind file counts, deterministic order.
    pub kind_counts: BTreeMap<String, u64>,
    /// Total bounded bytes observed.
    pub bounded_bytes: u64,
    /// `true` when any capture bound clipped the input.
    pub truncated: bool,
    /// External references, bounded, sorted, de-duplicated.
    pub external_refs: Vec<String>,
    /// Web lane marker.
    pub web_lane: WebLane,
    /// Probe results in execution order.
    pub probes: Vec<ProbeResult>,
    /// Overall grade.
    pub grade: Grade,
    /// Stable-sorted unique reason codes.
    pub reason_codes: Vec<String>,
    /// Identity digest; `None` until minted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mint_digest: Option<String>,
}

impl MintReceipt {
    /// Schema tag for v1 receipts.
    pub const SCHEMA_V1: &'static str = "mint/v1";

    /// Compute the identity digest with the digest field absent.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn compute_digest(&self) -> Result<String, ContractError> {
        crate::digest_with_field_nulled(self, "mintDigest")
    }

    /// Return the receipt with its identity digest attached.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn with_digest(mut self) -> Result<Self, ContractError> {
        self.mint_digest = Some(self.compute_digest()?);
        Ok(self)
    }

    /// Check the stored digest against the recomputed one.
    ///
    /// # Errors
    ///
    /// [`ContractError::DigestAbsent`] when unset,
    /// [`ContractError::DigestMismatch`] when stale.
    pub fn verify_digest(&self) -> Result<(), ContractError> {
        let stored = self
            .mint_digest
            .as_deref()
            .ok_or(ContractError::DigestAbsent)?;
        let computed = self.compute_digest()?;
        if stored == computed {
            Ok(())
        } else {
            Err(ContractError::DigestMismatch {
                stored: stored.to_string(),
                computed,
            })
        }
    }
}

/// The full safe-run receipt: mint plus the bindings the compare loop reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SafeRunReceipt {
    /// The minted receipt.
    pub mint: MintReceipt,
    /// Digest of the policy in force, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_digest: Option<String>,
    /// Host truth captured by an external adapter, compared opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_truth: Option<Value>,
}

impl SafeRunReceipt {
    /// Content-derived run identity: FNV fingerprint of the canonical receipt.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn run_fingerprint(&self) -> Result<String, ContractError> {
        Ok(weft_canon::fingerprint_value(self)?)
    }
}

/// The operator-facing wrapper written next to each stored run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OperatorReceipt {
    /// Sanitized target key the run belongs to.
    pub target_key: String,
    /// The run id inside the library.
    pub run_id: String,
    /// Verdict against the baseline, if a baseline exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict_vs_baseline: Option<CompareVerdict>,
    /// Buckets that fired in the compare.
    pub buckets: BTreeSet<Bucket>,
    /// Grade copied from the mint receipt.
    pub grade: Grade,
    /// Primary failure, if the run carries reasons.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<UserFailure>,
}

/// The machine report card (v0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReportCard {
    /// Grade copied from the mint receipt.
    pub grade: Grade,
    /// Per-kind file counts.
    pub kind_counts: BTreeMap<String, u64>,
    /// Number of external references.
    pub external_ref_count: usize,
    /// Sorted unique reason codes.
    pub reason_codes: Vec<String>,
    /// Remedy for the primary reason, `NONE` when clean.
    pub remedy: Remedy,
}

impl ReportCard {
    /// Derive a report card from a mint receipt.
    #[must_use]
    pub fn from_mint(mint: &MintReceipt) -> Self {
        let remedy = mint
            .reason_codes
            .first()
            .map_or(Remedy::None, |code| crate::reason::remedy_for(code));
        Self {
            grade: mint.grade,
            kind_counts: mint.kind_counts.clone(),
            external_ref_count: mint.external_refs.len(),
            reason_codes: mint.reason_codes.clone(),
            remedy,
        }
    }

    /// Render the human-readable text card.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("grade: {:?}\n", self.grade));
        out.push_str("files:\n");
        for (kind, count) in &self.kind_counts {
            out.push_str(&format!("  {kind}: {count}\n"));
        }
        out.push_str(&format!("external refs: {}\n", self.external_ref_count));
        if self.reason_codes.is_empty() {
            out.push_str("reasons: none\n");
        } else {
            out.push_str("reasons:\n");
            for code in &self.reason_codes {
                out.push_str(&format!("  {code}\n"));
            }
        }
        out.push_str(&format!("remedy: {:?}\n", self.remedy));
        out
    }
}
