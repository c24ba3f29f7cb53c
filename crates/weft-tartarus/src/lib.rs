// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-tartarus
//!
//! The scar log. Recovery, tamper, and denial events land here and are never
//! cleared; a recovered artifact is never recorded as clean. The log is
//! bounded per subject and globally, dropping oldest entries
//! deterministically, and the companion pulse ring chains run pulses by
//! digest so a receipt can publish one head for fast verification.

/// The digest-chained pulse ring.
pub mod pulse;

pub use pulse::{PulseRecord, PulseRing};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default per-subject record cap.
pub const DEFAULT_PER_SUBJECT_CAP: usize = 16;
/// Default global record cap.
pub const DEFAULT_GLOBAL_CAP: usize = 256;

/// One scar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TartarusRecord {
    /// Scar kind, e.g. `artifact.mismatch`, `artifact.recovered`.
    pub kind: String,
    /// Digest of the scarred subject.
    pub subject_digest: String,
    /// Sorted unique reason codes.
    pub reason_codes: Vec<String>,
    /// Monotonic sequence number, assigned by the log.
    pub seq: u64,
}

/// Summary of a log, published in receipt summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TartarusSummary {
    /// Records currently retained.
    pub record_count: usize,
    /// Records dropped by the caps since the log was created.
    pub dropped_count: usize,
    /// Sequence number of the newest record, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seq: Option<u64>,
    /// Per-kind retained counts, deterministic order.
    pub kinds: BTreeMap<String, usize>,
}

/// The append-only bounded scar log.
#[derive(Debug, Clone)]
pub struct TartarusLog {
    records: Vec<TartarusRecord>,
    per_subject_cap: usize,
    global_cap: usize,
    next_seq: u64,
    dropped: usize,
}

impl Default for TartarusLog {
    fn default() -> Self {
        Self::new(DEFAULT_PER_SUBJECT_CAP, DEFAULT_GLOBAL_CAP)
    }
}

impl TartarusLog {
    /// Create a log with explicit caps. Caps of zero retain nothing.
    #[must_use]
    pub fn new(per_subject_cap: usize, global_cap: usize) -> Self {
        Self {
            records: Vec::new(),
            per_subject_cap,
            global_cap,
            next_seq: 0,
            dropped: 0,
        }
    }

    /// Append a scar. Reason codes are sorted and de-duplicated; the caps
    /// then drop oldest entries, per subject first, then globally.
    pub fn append(
        &mut self,
        kind: impl Into<String>,
        subject_digest: impl Into<String>,
        reason_codes: impl IntoIterator<Item = String>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        let record = TartarusRecord {
            kind: kind.into(),
            subject_digest: subject_digest.into(),
            reason_codes: weft_canon::sort::sorted_reason_codes(reason_codes),
            seq,
        };
        let subject = record.subject_digest.clone();
        self.records.push(record);

        // Per-subject cap: drop the oldest record for this subject.
        loop {
            let subject_count = self
                .records
                .iter()
                .filter(|r| r.subject_digest == subject)
                .count();
            if subject_count <= self.per_subject_cap {
                break;
            }
            if let Some(pos) = self
                .records
                .iter()
                .position(|r| r.subject_digest == subject)
            {
                self.records.remove(pos);
                self.dropped += 1;
            }
        }

        // Global cap: drop the oldest record outright.
        while self.records.len() > self.global_cap {
            self.records.remove(0);
            self.dropped += 1;
        }

        seq
    }

    /// All retained records in append order.
    #[must_use]
    pub fn records(&self) -> &[TartarusRecord] {
        &self.records
    }

    /// Retained records bound to one subject, in append order.
    #[must_use]
    pub fn records_for(&self, subject_digest: &str) -> Vec<&TartarusRecord> {
        self.records
            .iter()
            .filter(|r| r.subject_digest == subject_digest)
            .collect()
    }

    /// Returns `true` when a subject carries a scar with the given code.
    #[must_use]
    pub fn has_scar(&self, subject_digest: &str, code: &str) -> bool {
        self.records_for(subject_digest)
            .iter()
            .any(|r| r.reason_codes.iter().any(|c| c == code))
    }

    /// Produce the receipt-facing summary.
    #[must_use]
    pub fn summary(&self) -> TartarusSummary {
        let mut kinds = BTreeMap::new();
        for record in &self.records {
            *kinds.entry(record.kind.clone()).or_insert(0) += 1;
        }
        TartarusSummary {
            record_count: self.records.len(),
            dropped_count: self.dropped,
            last_seq: self.records.last().map(|r| r.seq),
            kinds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::codes;

    #[test]
    fn append_assigns_monotonic_seq_and_sorts_reasons() {
        let mut log = TartarusLog::default();
        let s0 = log.append(
            "artifact.mismatch",
            "sha256:aa",
            vec![
                codes::ARTIFACT_RECOVERED.to_string(),
                codes::ARTIFACT_DIGEST_MISMATCH.to_string(),
            ],
        );
        let s1 = log.append("artifact.mismatch", "sha256:bb", vec![]);
        assert_eq!((s0, s1), (0, 1));
        assert_eq!(
            log.records()[0].reason_codes,
            vec![codes::ARTIFACT_DIGEST_MISMATCH, codes::ARTIFACT_RECOVERED]
        );
    }

    #[test]
    fn per_subject_cap_drops_oldest_for_that_subject() {
        let mut log = TartarusLog::new(2, 100);
        log.append("k", "sha256:aa", vec!["A_FIRST".to_string()]);
        log.append("k", "sha256:bb", vec![]);
        log.append("k", "sha256:aa", vec!["B_SECOND".to_string()]);
        log.append("k", "sha256:aa", vec!["C_THIRD".to_string()]);

        let for_aa = log.records_for("sha256:aa");
        assert_eq!(for_aa.len(), 2);
        assert_eq!(for_aa[0].reason_codes, vec!["B_SECOND"]);
        // The unrelated subject is untouched.
        assert_eq!(log.records_for("sha256:bb").len(), 1);
    }

    #[test]
    fn global_cap_drops_oldest_overall() {
        let mut log = TartarusLog::new(100, 3);
        for i in 0..5 {
            log.append("k", format!("sha256:{i:02}"), vec![]);
        }
        assert_eq!(log.records().len(), 3);
        assert_eq!(log.records()[0].subject_digest, "sha256:02");
        assert_eq!(log.summary().dropped_count, 2);
    }

    #[test]
    fn seq_keeps_climbing_past_drops() {
        let mut log = TartarusLog::new(100, 2);
        for _ in 0..4 {
            log.append("k", "sha256:aa", vec![]);
        }
        assert_eq!(log.records().len(), 2);
        assert_eq!(log.records().last().map(|r| r.seq), Some(3));
    }

    #[test]
    fn has_scar_looks_inside_reason_codes() {
        let mut log = TartarusLog::default();
        log.append(
            "artifact.mismatch",
            "sha256:aa",
            vec![codes::ARTIFACT_DIGEST_MISMATCH.to_string()],
        );
        assert!(log.has_scar("sha256:aa", codes::ARTIFACT_DIGEST_MISMATCH));
        assert!(!log.has_scar("sha256:aa", codes::ARTIFACT_RECOVERED));
        assert!(!log.has_scar("sha256:bb", codes::ARTIFACT_DIGEST_MISMATCH));
    }

    #[test]
    fn summary_counts_by_kind() {
        let mut log = TartarusLog::default();
        log.append("artifact.mismatch", "sha256:aa", vec![]);
        log.append("artifact.mismatch", "sha256:bb", vec![]);
        log.append("cap.deny", "sha256:aa", vec![]);
        let summary = log.summary();
        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.kinds.get("artifact.mismatch"), Some(&2));
        assert_eq!(summary.kinds.get("cap.deny"), Some(&1));
        assert_eq!(summary.last_seq, Some(2));
    }
}
