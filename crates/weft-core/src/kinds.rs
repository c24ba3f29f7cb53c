// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed enums of the contract.
//!
//! Every enum here is a frozen wire vocabulary; adding a variant is a
//! contract change and requires a new evidence fixture.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What an artifact is, as decided by classification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    /// A ZIP archive (contents come from an external parser).
    Zip,
    /// A native Windows executable.
    NativeExe,
    /// A native Windows installer package.
    NativeMsi,
    /// A Windows shortcut file.
    ShortcutLnk,
    /// A JavaScript source file.
    ScriptJs,
    /// A PowerShell script.
    ScriptPs1,
    /// A directory shaped like a static web root.
    WebDir,
    /// Plain text.
    Text,
    /// A directory shaped like a signed release bundle.
    ReleaseDir,
    /// Nothing above matched.
    Unknown,
}

/// The web-examination lane marker carried by safe-run receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebLane {
    /// The artifact is not a web directory; the lane does not apply.
    NotApplicable,
    /// The artifact is a web directory and eligible for the web lane.
    Eligible,
}

/// Overall grade of a minted receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    /// No findings.
    Ok,
    /// Findings worth surfacing, none disqualifying.
    Warn,
    /// A disqualifying finding.
    Deny,
    /// Tamper-class findings; preserve for review.
    Quarantine,
}

/// Execution mode a kernel is frozen to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Isolated realm, single message door, self-test required.
    Strict,
    /// Relaxed realm for artifacts predating the strict contract.
    Compatible,
    /// Legacy hosts only.
    Legacy,
}

/// Verdict of a strict load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Execution completed cleanly under the granted capability set.
    Allow,
    /// A precondition failed; the artifact never ran.
    Deny,
    /// The artifact ran and was observed misbehaving; preserved for review.
    Quarantine,
}

/// Release verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    /// Every binding invariant held.
    Ok,
    /// At least one binding invariant failed.
    Unverified,
    /// Structurally sound, but signatures could not be checked.
    Maybe,
}

/// Shop tier ladder. Ordering is semantic: `T0 < T1 < T2 < T3`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Tier {
    /// Untrusted.
    T0,
    /// Community.
    T1,
    /// Reviewed.
    T2,
    /// Pinned.
    T3,
}

/// A shop's accept decision on a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AcceptDecision {
    /// The shop accepts the block at the stamped tier.
    Accept,
    /// The shop rejects the block.
    Reject,
}

/// Decision carried by a gate receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateDecision {
    /// Admission granted.
    Allow,
    /// Admission refused.
    Deny,
}

/// Verdict of comparing a run against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareVerdict {
    /// No compare buckets fired.
    Same,
    /// At least one bucket fired.
    Changed,
    /// The baseline is frozen and the operator has not accepted the change.
    Blocked,
}

/// Change buckets produced by the compare algorithm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Bucket {
    /// File-kind counts or bounded byte count differ.
    C,
    /// External-ref set differs.
    X,
    /// Reason-code set differs.
    R,
    /// Policy digest differs.
    P,
    /// Host truth differs.
    H,
    /// Boundedness markers differ.
    B,
    /// Artifact digest differs.
    D,
}

impl ArtifactKind {
    /// Returns `true` for kinds that are never executed, only withheld.
    #[must_use]
    pub fn is_native_binary(self) -> bool {
        matches!(self, Self::NativeExe | Self::NativeMsi)
    }

    /// The web lane marker this kind implies.
    #[must_use]
    pub fn web_lane(self) -> WebLane {
        if self == Self::WebDir {
            WebLane::Eligible
        } else {
            WebLane::NotApplicable
        }
    }
}
