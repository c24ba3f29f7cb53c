// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minting.
//!
//! Folds a capture, a classification, the external refs, and the probe
//! results into a MintReceipt v1 and seals its digest. The grade is a pure
//! function of the receipt's own contents.

use crate::capture::Capture;
use weft_core::receipt::{MintReceipt, ProbeOutcome, ProbeResult};
use weft_core::{ArtifactKind, ContractError, Grade, codes};

/// Compute the grade from the receipt's reasons, refs, and probes.
///
/// Tamper-class reasons quarantine; denied capability attempts deny;
/// withheld execution or external references warn; anything else is OK.
#[must_use]
pub fn grade_of(reason_codes: &[String], external_refs: &[String], probes: &[ProbeResult]) -> Grade {
    let tamper = [codes::ARTIFACT_DIGEST_MISMATCH, codes::ARTIFACT_RECOVERED];
    if reason_codes.iter().any(|c| tamper.contains(&c.as_str())) {
        return Grade::Quarantine;
    }
    let any_denied = probes
        .iter()
        .flat_map(|p| p.attempted.iter())
        .any(|a| !a.allowed);
    if any_denied {
        return Grade::Deny;
    }
    let withheld = probes.iter().any(|p| p.outcome == ProbeOutcome::Withheld);
    if withheld || !external_refs.is_empty() {
        return Grade::Warn;
    }
    Grade::Ok
}

/// Build and seal the mint receipt.
///
/// # Errors
///
/// Propagates canonicalization failures from sealing.
pub fn build_mint(
    capture: &Capture,
    kind: ArtifactKind,
    external_refs: Vec<String>,
    probes: Vec<ProbeResult>,
) -> Result<MintReceipt, ContractError> {
    let mut reason_codes: Vec<String> = probes
        .iter()
        .flat_map(|p| {
            p.reason_codes
                .iter()
                .cloned()
                .chain(p.attempted.iter().flat_map(|a| a.reason_codes.iter().cloned()))
        })
        .collect();
    reason_codes = weft_canon::sort::sorted_reason_codes(reason_codes);

    let grade = grade_of(&reason_codes, &external_refs, &probes);
    let capture_digest = capture.tree.capture_digest()?;
    let artifact_fingerprint =
        weft_canon::fingerprint_value(&capture.tree).map_err(ContractError::Canon)?;

    MintReceipt {
        schema: MintReceipt::SCHEMA_V1.to_string(),
        artifact_kind: kind,
        artifact_fingerprint,
        artifact_digest: capture.artifact_digest.clone(),
        capture_digest,
        kind_counts: capture.tree.kind_counts(),
        bounded_bytes: capture.tree.total_bytes,
        truncated: capture.tree.truncated,
        external_refs,
        web_lane: kind.web_lane(),
        probes,
        grade,
        reason_codes,
        mint_digest: None,
    }
    .with_digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::receipt::{CapAttempt, ProbeKind};

    fn probe_with(attempts: Vec<CapAttempt>, outcome: ProbeOutcome) -> ProbeResult {
        ProbeResult {
            kind: ProbeKind::LoadOnly,
            outcome,
            attempted: attempts,
            reason_codes: vec![],
        }
    }

    #[test]
    fn clean_artifacts_grade_ok() {
        assert_eq!(grade_of(&[], &[], &[]), Grade::Ok);
    }

    #[test]
    fn external_refs_grade_warn() {
        let refs = vec!["https://x.example".to_string()];
        assert_eq!(grade_of(&[], &refs, &[]), Grade::Warn);
    }

    #[test]
    fn withheld_execution_grades_warn() {
        let probes = vec![probe_with(vec![], ProbeOutcome::Withheld)];
        assert_eq!(grade_of(&[], &[], &probes), Grade::Warn);
    }

    #[test]
    fn denied_attempts_grade_deny() {
        let probes = vec![probe_with(
            vec![CapAttempt {
                cap_id: "net.fetch".to_string(),
                allowed: false,
                reason_codes: vec![codes::CAP_NOT_GRANTED.to_string()],
            }],
            ProbeOutcome::Completed,
        )];
        assert_eq!(grade_of(&[], &[], &probes), Grade::Deny);
    }

    #[test]
    fn tamper_reasons_grade_quarantine_over_everything() {
        let probes = vec![probe_with(
            vec![CapAttempt {
                cap_id: "net.fetch".to_string(),
                allowed: false,
                reason_codes: vec![codes::CAP_NOT_GRANTED.to_string()],
            }],
            ProbeOutcome::Completed,
        )];
        let reasons = vec![codes::ARTIFACT_DIGEST_MISMATCH.to_string()];
        assert_eq!(grade_of(&reasons, &[], &probes), Grade::Quarantine);
    }
}
