// SPDX-License-Identifier: MIT OR Apache-2.0

//! The frozen reason-code registry.
//!
//! Codes follow the grammar `[A-Z][A-Z0-9_]*` and are grouped by taxonomy
//! prefix. Additions require a new evidence fixture; nothing here is ever
//! renamed or reused.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stable reason codes, grouped by taxonomy prefix.
pub mod codes {
    // ── IMPORT / HOST ────────────────────────────────────────────────────
    /// Input exceeded a hard capture bound.
    pub const HOST_INPUT_OVERSIZE: &str = "HOST_INPUT_OVERSIZE";
    /// A field failed shape validation.
    pub const FIELD_INVALID: &str = "FIELD_INVALID";
    /// Canonicalization hit the nesting cap.
    pub const CYCLE_IN_CANONICAL: &str = "CYCLE_IN_CANONICAL";

    // ── TRUST ────────────────────────────────────────────────────────────
    /// A required signature is absent.
    pub const TRUST_SIGNATURE_REQUIRED: &str = "TRUST_SIGNATURE_REQUIRED";
    /// A signature failed verification.
    pub const TRUST_SIGNATURE_INVALID: &str = "TRUST_SIGNATURE_INVALID";
    /// A content hash did not match its declaration.
    pub const TRUST_HASH_MISMATCH: &str = "TRUST_HASH_MISMATCH";
    /// More than one package matched a trust rule target.
    pub const TRUST_PKG_AMBIGUOUS: &str = "TRUST_PKG_AMBIGUOUS";
    /// No package matched a trust rule target.
    pub const TRUST_PKG_MISSING: &str = "TRUST_PKG_MISSING";
    /// Evidence of a required kind is absent or the kind is unknown.
    pub const EVIDENCE_MISSING: &str = "EVIDENCE_MISSING";
    /// An evidence digest referenced by a manifest did not resolve.
    pub const EVIDENCE_DIGEST_MISMATCH: &str = "EVIDENCE_DIGEST_MISMATCH";

    // ── CAP (kernel) ─────────────────────────────────────────────────────
    /// Message execution mode differs from the kernel's frozen mode.
    pub const MODE_MISMATCH: &str = "MODE_MISMATCH";
    /// Message plan digest differs from the kernel's frozen plan digest.
    pub const PLANDIGEST_MISMATCH: &str = "PLANDIGEST_MISMATCH";
    /// Message session nonce differs from the kernel's session nonce.
    pub const NONCE_MISMATCH: &str = "NONCE_MISMATCH";
    /// Message caller block differs from the kernel's caller block.
    pub const CALLER_MISMATCH: &str = "CALLER_MISMATCH";
    /// Strict mode requires a passing realm self-test first.
    pub const SELFTEST_REQUIRED: &str = "SELFTEST_REQUIRED";
    /// The request id was already seen this session.
    pub const REPLAY_DETECTED: &str = "REPLAY_DETECTED";
    /// The caller's tier is below the runtime tier floor.
    pub const TIER_VIOLATION: &str = "TIER_VIOLATION";
    /// The capability id is not in the kernel's known set.
    pub const CAP_UNKNOWN: &str = "CAP_UNKNOWN";
    /// The capability is known but not granted to this block.
    pub const CAP_NOT_GRANTED: &str = "CAP_NOT_GRANTED";
    /// The capability is administratively disabled.
    pub const CAP_DISABLED_V0: &str = "CAP_DISABLED_V0";
    /// The capability is not eligible in the admitting market.
    pub const CAP_NOT_ELIGIBLE_MARKET: &str = "CAP_NOT_ELIGIBLE_MARKET";

    // ── RECEIPT (market gate) ────────────────────────────────────────────
    /// No admission receipt was presented.
    pub const RECEIPT_MISSING: &str = "RECEIPT_MISSING";
    /// The admission receipt failed shape or identity validation.
    pub const RECEIPT_INVALID: &str = "RECEIPT_INVALID";
    /// The admission receipt binds a different subject.
    pub const RECEIPT_SUBJECT_MISMATCH: &str = "RECEIPT_SUBJECT_MISMATCH";
    /// The admission receipt records a deny decision.
    pub const RECEIPT_DENY: &str = "RECEIPT_DENY";

    // ── SECRET ZONE ──────────────────────────────────────────────────────
    /// The capability requires the secret zone.
    pub const SECRET_ZONE_REQUIRED: &str = "SECRET_ZONE_REQUIRED";
    /// The secret zone is not available in this session.
    pub const SECRET_ZONE_UNAVAILABLE: &str = "SECRET_ZONE_UNAVAILABLE";

    // ── CONSENT ──────────────────────────────────────────────────────────
    /// No consent claim was presented for a consent-gated capability.
    pub const CONSENT_MISSING: &str = "CONSENT_MISSING";
    /// The consent claim failed shape validation.
    pub const CONSENT_INVALID: &str = "CONSENT_INVALID";
    /// The consent claim binds a different plan or block.
    pub const CONSENT_MISMATCH: &str = "CONSENT_MISMATCH";
    /// The consent id was already used or the sequence did not advance.
    pub const CONSENT_REPLAY: &str = "CONSENT_REPLAY";

    // ── ARTIFACT / RECOVERY ──────────────────────────────────────────────
    /// No artifact bytes exist at the requested digest key.
    pub const ARTIFACT_MISSING: &str = "ARTIFACT_MISSING";
    /// Stored bytes no longer hash to their key.
    pub const ARTIFACT_DIGEST_MISMATCH: &str = "ARTIFACT_DIGEST_MISMATCH";
    /// Verified recovery restored the artifact.
    pub const ARTIFACT_RECOVERED: &str = "ARTIFACT_RECOVERED";
    /// Recovery was requested without a known expected digest.
    pub const RECOVERY_SOURCE_UNKNOWN: &str = "RECOVERY_SOURCE_UNKNOWN";
    /// No recovery candidate satisfied strict verification.
    pub const RECOVERY_CANDIDATE_INVALID: &str = "RECOVERY_CANDIDATE_INVALID";

    // ── RELEASE ──────────────────────────────────────────────────────────
    /// `releaseId` does not equal the digest of the manifest body.
    pub const RELEASE_MANIFEST_INVALID: &str = "RELEASE_MANIFEST_INVALID";
    /// A manifest signature failed against the pinned allowlist.
    pub const RELEASE_SIGNATURE_BAD: &str = "RELEASE_SIGNATURE_BAD";
    /// Signatures could not be checked (no crypto port available).
    pub const RELEASE_SIGNATURE_UNCHECKED: &str = "RELEASE_SIGNATURE_UNCHECKED";
    /// Manifest plan digest differs from the bundle's plan digest.
    pub const RELEASE_PLANDIGEST_MISMATCH: &str = "RELEASE_PLANDIGEST_MISMATCH";
    /// Manifest block set differs from the bundle's block set.
    pub const RELEASE_BLOCKSET_MISMATCH: &str = "RELEASE_BLOCKSET_MISMATCH";
    /// The release is not verified and the capability is release-gated.
    pub const RELEASE_UNVERIFIED: &str = "RELEASE_UNVERIFIED";

    // ── STAMP ────────────────────────────────────────────────────────────
    /// A shop stamp was presented but failed validation.
    pub const STAMP_INVALID: &str = "STAMP_INVALID";

    // ── STRICT LOADER ────────────────────────────────────────────────────
    /// The strict realm self-test found a forbidden ambient facility.
    pub const STRICT_SELFTEST_FAILED: &str = "STRICT_SELFTEST_FAILED";
    /// Execution withheld: the artifact kind is never executed.
    pub const EXECUTION_WITHHELD_UNSUPPORTED_ARTIFACT: &str =
        "EXECUTION_WITHHELD_UNSUPPORTED_ARTIFACT";

    // ── MINT / PRIVACY ───────────────────────────────────────────────────
    /// The mint receipt failed validation.
    pub const MINT_INVALID: &str = "MINT_INVALID";
    /// A forbidden key name appeared in a receipt-bound object.
    pub const PRIVACY_FORBIDDEN_KEY: &str = "PRIVACY_FORBIDDEN_KEY";
    /// A forbidden value pattern appeared in a receipt-bound object.
    pub const PRIVACY_FORBIDDEN_VALUE: &str = "PRIVACY_FORBIDDEN_VALUE";
    /// A reason code violated the grammar.
    pub const REASON_CODE_INVALID: &str = "REASON_CODE_INVALID";
    /// A reason-code list was not sorted and unique.
    pub const REASON_CODES_UNSORTED: &str = "REASON_CODES_UNSORTED";
}

/// Returns `true` if `code` matches the grammar `[A-Z][A-Z0-9_]*`.
#[must_use]
pub fn is_valid_reason_code(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// The remedy offered alongside a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Remedy {
    /// Supply the missing evidence and re-run.
    ProvideEvidence,
    /// Re-run in a less strict execution mode.
    DowngradeMode,
    /// Move the block to a lower tier.
    MoveTierDown,
    /// Rebuild the artifact from a trusted source.
    RebuildFromTrusted,
    /// Contact the stamping shop.
    ContactShop,
    /// No remedy applies.
    None,
}

/// A user-visible failure: primary reason, primary remedy, details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserFailure {
    /// The primary reason code.
    pub primary_reason: String,
    /// The primary remedy.
    pub primary_remedy: Remedy,
    /// Additional sorted reason codes.
    pub details: Vec<String>,
}

impl UserFailure {
    /// Build a failure from a sorted reason list; the first code is primary.
    ///
    /// Returns `None` for an empty list.
    #[must_use]
    pub fn from_reasons(reasons: &[String]) -> Option<Self> {
        let primary = reasons.first()?.clone();
        Some(Self {
            primary_remedy: remedy_for(&primary),
            details: reasons[1..].to_vec(),
            primary_reason: primary,
        })
    }
}

/// The canonical remedy for a reason code.
#[must_use]
pub fn remedy_for(code: &str) -> Remedy {
    match code {
        codes::EVIDENCE_MISSING
        | codes::TRUST_SIGNATURE_REQUIRED
        | codes::CONSENT_MISSING
        | codes::RECEIPT_MISSING => Remedy::ProvideEvidence,
        codes::SELFTEST_REQUIRED | codes::STRICT_SELFTEST_FAILED | codes::MODE_MISMATCH => {
            Remedy::DowngradeMode
        }
        codes::TIER_VIOLATION => Remedy::MoveTierDown,
        codes::ARTIFACT_DIGEST_MISMATCH
        | codes::TRUST_HASH_MISMATCH
        | codes::RELEASE_MANIFEST_INVALID
        | codes::RELEASE_PLANDIGEST_MISMATCH
        | codes::RELEASE_BLOCKSET_MISMATCH => Remedy::RebuildFromTrusted,
        codes::STAMP_INVALID | codes::RELEASE_SIGNATURE_BAD => Remedy::ContactShop,
        _ => Remedy::None,
    }
}
