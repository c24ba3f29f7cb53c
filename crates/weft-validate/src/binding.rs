// SPDX-License-Identifier: MIT OR Apache-2.0

//! Digest-binding checks.
//!
//! These wrap the contract identity laws into issue lists so callers can
//! aggregate them with the other validators.

use weft_core::{
    ContractError, EvidenceRecord, Issue, MintReceipt, ReleaseManifest, codes,
    issue::into_result,
};

fn binding_issue(code: &str, path: &str, err: &ContractError) -> Issue {
    match err {
        ContractError::DigestMismatch { stored, computed } => Issue::with_detail(
            code,
            path,
            format!("stored {stored}, computed {computed}"),
        ),
        ContractError::DigestAbsent => Issue::with_detail(code, path, "digest absent"),
        ContractError::Canon(e) => Issue::with_detail(code, path, e.to_string()),
    }
}

/// Check `evidenceId = digest(canonical(record \ {evidenceId}))`.
///
/// # Errors
///
/// Returns an `EVIDENCE_DIGEST_MISMATCH` issue when the law fails.
pub fn validate_evidence_binding(record: &EvidenceRecord) -> Result<(), Vec<Issue>> {
    let issues = match record.verify_id() {
        Ok(()) => vec![],
        Err(e) => vec![binding_issue(
            codes::EVIDENCE_DIGEST_MISMATCH,
            "$.evidenceId",
            &e,
        )],
    };
    into_result((), issues)
}

/// Check `releaseId = digest(canonical(manifestBody))`.
///
/// # Errors
///
/// Returns a `RELEASE_MANIFEST_INVALID` issue when the law fails.
pub fn validate_release_binding(manifest: &ReleaseManifest) -> Result<(), Vec<Issue>> {
    let issues = match manifest.verify_id() {
        Ok(()) => vec![],
        Err(e) => vec![binding_issue(
            codes::RELEASE_MANIFEST_INVALID,
            "$.releaseId",
            &e,
        )],
    };
    into_result((), issues)
}

/// Check the mint digest against the recomputed receipt.
///
/// # Errors
///
/// Returns a `MINT_INVALID` issue when the law fails.
pub fn validate_mint_binding(receipt: &MintReceipt) -> Result<(), Vec<Issue>> {
    let issues = match receipt.verify_digest() {
        Ok(()) => vec![],
        Err(e) => vec![binding_issue(codes::MINT_INVALID, "$.mintDigest", &e)],
    };
    into_result((), issues)
}
