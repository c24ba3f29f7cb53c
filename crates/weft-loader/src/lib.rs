// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-loader
//!
//! The strict loader. Before any untrusted entry runs: the source digest is
//! recomputed against the store (tamper scars Tartarus and rides the
//! recovery lane), a kernel is bound to the release's plan and policy, an
//! isolated realm is spawned and self-tested, and a single message door is
//! installed. Execution ends in a load result whose verdict, reasons, and
//! digests are deterministic functions of the inputs.

/// Realms, entries, and the self-test.
pub mod realm;

pub use realm::{
    EntryError, FORBIDDEN_FACILITIES, Realm, RealmBuilder, RealmEntry, ScriptedEntry,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use weft_core::{ReleaseStatus, Verdict, codes};
use weft_kernel::{DenyEvent, Kernel, KernelContext, KernelDoor};
use weft_store::recovery::{BundleCache, RecoveryPlan, recover};
use weft_store::{ArtifactStore, StoreError};
use weft_tartarus::{PulseRing, TartarusLog, TartarusSummary};

/// The release facts a load is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReleaseBinding {
    /// The release being executed.
    pub release_id: String,
    /// Verification outcome at load time.
    pub status: ReleaseStatus,
    /// Reasons behind a non-OK status.
    pub reason_codes: Vec<String>,
}

/// Rollback facts recorded when the recovery lane restored the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RollbackInfo {
    /// The bundle key the bytes were restored from.
    pub bundle_key: String,
}

/// Everything a strict load needs.
pub struct LoadRequest {
    /// The entry to execute.
    pub entry: Arc<dyn RealmEntry>,
    /// Digest the artifact bytes must hash to.
    pub expected_artifact_digest: String,
    /// Digest of the policy in force.
    pub policy_digest: String,
    /// Evidence ids bound to the load.
    pub evidence_digests: Vec<String>,
    /// The kernel context to freeze.
    pub kernel_ctx: KernelContext,
    /// Release binding, when the artifact is a signed release.
    pub release: Option<ReleaseBinding>,
    /// Block set the recovery lane must match.
    pub recovery_blocks: Vec<String>,
    /// Path digest the recovery lane must match, when pinned.
    pub recovery_path_digest: Option<String>,
}

impl std::fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadRequest")
            .field("expected_artifact_digest", &self.expected_artifact_digest)
            .field("policy_digest", &self.policy_digest)
            .field("release", &self.release)
            .finish_non_exhaustive()
    }
}

/// The result of a strict load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StrictLoadResult {
    /// The load verdict.
    pub verdict: Verdict,
    /// Whether the entry ran to completion.
    pub execution_ok: bool,
    /// Sorted unique reasons across the whole load.
    pub reason_codes: Vec<String>,
    /// Plan the kernel was frozen to.
    pub plan_digest: String,
    /// Policy the load was bound to.
    pub policy_digest: String,
    /// Evidence ids bound to the load.
    pub evidence_digests: Vec<String>,
    /// What the artifact was expected to hash to.
    pub expected_artifact_digest: String,
    /// What the stored bytes actually hashed to.
    pub observed_artifact_digest: String,
    /// The executed release, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_id: Option<String>,
    /// Its verification status, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_status: Option<ReleaseStatus>,
    /// Rollback facts, when recovery restored the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackInfo>,
    /// Scar log summary after the load.
    pub tartarus_summary: TartarusSummary,
    /// Head of the pulse chain after the load, for fast verification.
    pub pulse_head: String,
}

/// Load and execute an artifact under strict enforcement.
///
/// The only I/O door the entry sees is the kernel channel; cancellation is
/// the channel closing. Denials observed during execution turn an otherwise
/// clean run into `QUARANTINE`; precondition failures are `DENY` and the
/// entry never runs.
pub async fn load_strict(
    request: LoadRequest,
    store: &dyn ArtifactStore,
    cache: &dyn BundleCache,
    tartarus: &mut TartarusLog,
    pulses: &mut PulseRing,
) -> StrictLoadResult {
    let expected = request.expected_artifact_digest.clone();
    let mut reasons: Vec<String> = Vec::new();
    let mut rollback = None;
    let mut observed = expected.clone();
    let _ = pulses.push("run.start", request.kernel_ctx.plan_digest.clone(), expected.clone());

    // Digest precheck, with the recovery lane on tamper.
    match store.get(&expected) {
        Ok(_) => {}
        Err(StoreError::DigestMismatch {
            observed: seen, ..
        }) => {
            observed = seen;
            tartarus.append(
                "artifact.mismatch",
                expected.clone(),
                vec![codes::ARTIFACT_DIGEST_MISMATCH.to_string()],
            );
            let plan = RecoveryPlan {
                expected_digest: Some(expected.clone()),
                plan_digest: request.kernel_ctx.plan_digest.clone(),
                blocks: request.recovery_blocks.clone(),
                path_digest: request.recovery_path_digest.clone(),
            };
            let outcome = recover(&plan, cache, store, tartarus);
            reasons.extend(outcome.reason_codes.iter().cloned());
            if outcome.recovered {
                observed = expected.clone();
                rollback = outcome.receipt.bundle_key.map(|bundle_key| RollbackInfo {
                    bundle_key,
                });
            } else {
                reasons.push(codes::ARTIFACT_DIGEST_MISMATCH.to_string());
                return denied(request, reasons, observed, rollback, tartarus, pulses);
            }
        }
        Err(e) => {
            reasons.push(e.code().to_string());
            return denied(request, reasons, observed, rollback, tartarus, pulses);
        }
    }

    // Bind the kernel and spawn the realm.
    let mut kernel = Kernel::new(request.kernel_ctx.clone());
    let realm = RealmBuilder::strict().build();
    match realm.self_test() {
        Ok(()) => kernel.record_selftest(true),
        Err(found) => {
            kernel.record_selftest(false);
            tracing::error!(?found, "strict realm self-test failed");
            reasons.push(codes::STRICT_SELFTEST_FAILED.to_string());
            return denied(request, reasons, observed, rollback, tartarus, pulses);
        }
    }

    // Install the door and run the entry; the door is the realm's world.
    let (door, session) = KernelDoor::spawn(kernel);
    let execution = request.entry.run(door.clone()).await;
    drop(door);
    let kernel = match session.await {
        Ok(kernel) => kernel,
        Err(_) => {
            reasons.push(codes::STRICT_SELFTEST_FAILED.to_string());
            return denied(request, reasons, observed, rollback, tartarus, pulses);
        }
    };

    let execution_ok = execution.is_ok();
    let denials: &[DenyEvent] = kernel.deny_events();
    for event in denials {
        reasons.extend(event.reason_codes.iter().cloned());
    }

    // A run is ALLOW only when it is clean: entry completed, no denials,
    // and no scar-class reasons (a recovered artifact is never clean).
    let verdict = if execution_ok && reasons.is_empty() {
        Verdict::Allow
    } else {
        Verdict::Quarantine
    };
    let pulse_kind = match verdict {
        Verdict::Allow => "run.allow",
        Verdict::Quarantine => "run.quarantine",
        Verdict::Deny => "run.deny",
    };
    let _ = pulses.push(
        pulse_kind,
        request.kernel_ctx.plan_digest.clone(),
        expected.clone(),
    );

    StrictLoadResult {
        verdict,
        execution_ok,
        reason_codes: weft_canon::sort::sorted_reason_codes(reasons),
        plan_digest: request.kernel_ctx.plan_digest,
        policy_digest: request.policy_digest,
        evidence_digests: request.evidence_digests,
        expected_artifact_digest: expected,
        observed_artifact_digest: observed,
        release_id: request.release.as_ref().map(|r| r.release_id.clone()),
        release_status: request.release.as_ref().map(|r| r.status),
        rollback,
        tartarus_summary: tartarus.summary(),
        pulse_head: pulses.head().to_string(),
    }
}

fn denied(
    request: LoadRequest,
    reasons: Vec<String>,
    observed: String,
    rollback: Option<RollbackInfo>,
    tartarus: &TartarusLog,
    pulses: &mut PulseRing,
) -> StrictLoadResult {
    let _ = pulses.push(
        "run.deny",
        request.kernel_ctx.plan_digest.clone(),
        request.expected_artifact_digest.clone(),
    );
    StrictLoadResult {
        verdict: Verdict::Deny,
        execution_ok: false,
        reason_codes: weft_canon::sort::sorted_reason_codes(reasons),
        plan_digest: request.kernel_ctx.plan_digest,
        policy_digest: request.policy_digest,
        evidence_digests: request.evidence_digests,
        expected_artifact_digest: request.expected_artifact_digest,
        observed_artifact_digest: observed,
        release_id: request.release.as_ref().map(|r| r.release_id.clone()),
        release_status: request.release.as_ref().map(|r| r.status),
        rollback,
        tartarus_summary: tartarus.summary(),
        pulse_head: pulses.head().to_string(),
    }
}
