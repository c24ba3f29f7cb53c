// SPDX-License-Identifier: MIT OR Apache-2.0

//! Consent claims for consent-gated capabilities.
//!
//! A consent claim authorizes exactly one use of a gated capability: the
//! claim's id may be used once per session and its sequence must advance
//! strictly past the last recorded one.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use weft_core::codes;

/// What a consent claim binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConsentSubject {
    /// The plan the consent covers.
    pub plan_digest: String,
    /// The block the consent covers.
    pub block_hash: String,
}

/// A single-use consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConsentClaim {
    /// Unique consent id, one use per session.
    pub consent_id: String,
    /// The capability the consent authorizes.
    pub action: String,
    /// The bound subject.
    pub subject: ConsentSubject,
    /// Who issued the consent.
    pub issuer_id: String,
    /// Strictly increasing sequence number.
    pub seq: u64,
}

/// Per-session consent bookkeeping.
#[derive(Debug, Default)]
pub struct ConsentTracker {
    used_ids: BTreeSet<String>,
    last_seq: Option<u64>,
}

impl ConsentTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check a claim for one invocation of `cap_id`, recording it on
    /// success. Returns the reason codes of every failed check.
    pub fn check_and_record(
        &mut self,
        claim: Option<&ConsentClaim>,
        cap_id: &str,
        plan_digest: &str,
        block_hash: &str,
    ) -> Vec<String> {
        let Some(claim) = claim else {
            return vec![codes::CONSENT_MISSING.to_string()];
        };

        let mut reasons = Vec::new();
        if claim.consent_id.is_empty() || claim.issuer_id.is_empty() {
            reasons.push(codes::CONSENT_INVALID.to_string());
        }
        if claim.action != cap_id {
            reasons.push(codes::CONSENT_INVALID.to_string());
        }
        if claim.subject.plan_digest != plan_digest || claim.subject.block_hash != block_hash {
            reasons.push(codes::CONSENT_MISMATCH.to_string());
        }
        let replayed_id = self.used_ids.contains(&claim.consent_id);
        let stale_seq = self.last_seq.is_some_and(|last| claim.seq <= last);
        if replayed_id || stale_seq {
            reasons.push(codes::CONSENT_REPLAY.to_string());
        }

        if reasons.is_empty() {
            self.used_ids.insert(claim.consent_id.clone());
            self.last_seq = Some(claim.seq);
        }
        weft_canon::sort::sorted_reason_codes(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(id: &str, seq: u64) -> ConsentClaim {
        ConsentClaim {
            consent_id: id.to_string(),
            action: "id.sign".to_string(),
            subject: ConsentSubject {
                plan_digest: "plan-1".to_string(),
                block_hash: "block-1".to_string(),
            },
            issuer_id: "operator-1".to_string(),
            seq,
        }
    }

    #[test]
    fn valid_claim_is_recorded_once() {
        let mut tracker = ConsentTracker::new();
        let reasons =
            tracker.check_and_record(Some(&claim("c1", 1)), "id.sign", "plan-1", "block-1");
        assert!(reasons.is_empty());

        // Same id again is a replay.
        let reasons =
            tracker.check_and_record(Some(&claim("c1", 2)), "id.sign", "plan-1", "block-1");
        assert_eq!(reasons, vec![codes::CONSENT_REPLAY]);
    }

    #[test]
    fn seq_must_strictly_advance() {
        let mut tracker = ConsentTracker::new();
        tracker.check_and_record(Some(&claim("c1", 5)), "id.sign", "plan-1", "block-1");
        let reasons =
            tracker.check_and_record(Some(&claim("c2", 5)), "id.sign", "plan-1", "block-1");
        assert_eq!(reasons, vec![codes::CONSENT_REPLAY]);
        let reasons =
            tracker.check_and_record(Some(&claim("c3", 6)), "id.sign", "plan-1", "block-1");
        assert!(reasons.is_empty());
    }

    #[test]
    fn missing_claim_is_its_own_code() {
        let mut tracker = ConsentTracker::new();
        assert_eq!(
            tracker.check_and_record(None, "id.sign", "plan-1", "block-1"),
            vec![codes::CONSENT_MISSING]
        );
    }

    #[test]
    fn subject_mismatch_is_reported() {
        let mut tracker = ConsentTracker::new();
        let reasons =
            tracker.check_and_record(Some(&claim("c1", 1)), "id.sign", "plan-2", "block-1");
        assert_eq!(reasons, vec![codes::CONSENT_MISMATCH]);
    }

    #[test]
    fn wrong_action_is_invalid() {
        let mut tracker = ConsentTracker::new();
        let mut c = claim("c1", 1);
        c.action = "net.fetch".to_string();
        let reasons = tracker.check_and_record(Some(&c), "id.sign", "plan-1", "block-1");
        assert_eq!(reasons, vec![codes::CONSENT_INVALID]);
    }

    #[test]
    fn failed_claim_is_not_consumed() {
        let mut tracker = ConsentTracker::new();
        // Mismatched subject fails and must not burn the id or the seq.
        tracker.check_and_record(Some(&claim("c1", 3)), "id.sign", "plan-x", "block-1");
        let reasons =
            tracker.check_and_record(Some(&claim("c1", 3)), "id.sign", "plan-1", "block-1");
        assert!(reasons.is_empty());
    }
}
