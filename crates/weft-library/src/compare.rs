// SPDX-License-Identifier: MIT OR Apache-2.0

//! The compare algorithm.
//!
//! Two runs are compared bucket by bucket; the verdict is a pure function of
//! the buckets and the baseline's frozen state.

use std::collections::BTreeSet;
use weft_core::receipt::SafeRunReceipt;
use weft_core::{Bucket, CompareVerdict};

/// Compute the change buckets between a baseline run and a new run.
#[must_use]
pub fn compare_runs(baseline: &SafeRunReceipt, run: &SafeRunReceipt) -> BTreeSet<Bucket> {
    let mut buckets = BTreeSet::new();
    if baseline.mint.artifact_digest != run.mint.artifact_digest {
        buckets.insert(Bucket::D);
    }
    if baseline.mint.kind_counts != run.mint.kind_counts
        || baseline.mint.bounded_bytes != run.mint.bounded_bytes
    {
        buckets.insert(Bucket::C);
    }
    if baseline.mint.external_refs != run.mint.external_refs {
        buckets.insert(Bucket::X);
    }
    if baseline.mint.reason_codes != run.mint.reason_codes {
        buckets.insert(Bucket::R);
    }
    if baseline.policy_digest != run.policy_digest {
        buckets.insert(Bucket::P);
    }
    if baseline.host_truth != run.host_truth {
        buckets.insert(Bucket::H);
    }
    if baseline.mint.truncated != run.mint.truncated {
        buckets.insert(Bucket::B);
    }
    buckets
}

/// The verdict for a set of buckets against a baseline.
///
/// Baseline acceptance is explicit and operator-visible; a frozen baseline
/// turns any change into `BLOCKED` until the operator accepts.
#[must_use]
pub fn verdict_for(buckets: &BTreeSet<Bucket>, baseline_frozen: bool) -> CompareVerdict {
    if buckets.is_empty() {
        CompareVerdict::Same
    } else if baseline_frozen {
        CompareVerdict::Blocked
    } else {
        CompareVerdict::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use weft_core::receipt::MintReceipt;
    use weft_core::{ArtifactKind, Grade, WebLane};

    fn receipt(digest: &str, refs: &[&str]) -> SafeRunReceipt {
        SafeRunReceipt {
            mint: MintReceipt {
                schema: MintReceipt::SCHEMA_V1.to_string(),
                artifact_kind: ArtifactKind::Text,
                artifact_fingerprint: "fnv1a32:00000001".to_string(),
                artifact_digest: digest.to_string(),
                capture_digest: weft_canon::sha256_digest(b"capture"),
                kind_counts: BTreeMap::from([("txt".to_string(), 1)]),
                bounded_bytes: 10,
                truncated: false,
                external_refs: refs.iter().map(|r| r.to_string()).collect(),
                web_lane: WebLane::NotApplicable,
                probes: vec![],
                grade: Grade::Ok,
                reason_codes: vec![],
                mint_digest: None,
            },
            policy_digest: None,
            host_truth: None,
        }
    }

    #[test]
    fn identical_runs_have_no_buckets() {
        let a = receipt("sha256:same", &[]);
        let buckets = compare_runs(&a, &a.clone());
        assert!(buckets.is_empty());
        assert_eq!(verdict_for(&buckets, false), CompareVerdict::Same);
    }

    #[test]
    fn digest_change_fires_d() {
        let a = receipt("sha256:one", &[]);
        let b = receipt("sha256:two", &[]);
        let buckets = compare_runs(&a, &b);
        assert!(buckets.contains(&Bucket::D));
        assert_eq!(verdict_for(&buckets, false), CompareVerdict::Changed);
    }

    #[test]
    fn content_change_fires_c_and_d_at_minimum() {
        let a = receipt("sha256:one", &[]);
        let mut b = receipt("sha256:two", &[]);
        b.mint.bounded_bytes = 99;
        b.mint.kind_counts.insert("js".to_string(), 1);
        let buckets = compare_runs(&a, &b);
        assert!(buckets.contains(&Bucket::C));
        assert!(buckets.contains(&Bucket::D));
    }

    #[test]
    fn ref_reason_policy_host_and_bound_buckets_fire() {
        let a = receipt("sha256:same", &[]);
        let mut b = receipt("sha256:same", &["https://x.example"]);
        b.mint.reason_codes = vec!["CAP_NOT_GRANTED".to_string()];
        b.policy_digest = Some(weft_canon::sha256_digest(b"policy"));
        b.host_truth = Some(serde_json::json!({"os": "other"}));
        b.mint.truncated = true;
        let buckets = compare_runs(&a, &b);
        for bucket in [Bucket::X, Bucket::R, Bucket::P, Bucket::H, Bucket::B] {
            assert!(buckets.contains(&bucket), "{bucket:?}");
        }
        assert!(!buckets.contains(&Bucket::D));
    }

    #[test]
    fn frozen_baseline_blocks_changes() {
        let a = receipt("sha256:one", &[]);
        let b = receipt("sha256:two", &[]);
        let buckets = compare_runs(&a, &b);
        assert_eq!(verdict_for(&buckets, true), CompareVerdict::Blocked);
        // Frozen with no change is still SAME.
        assert_eq!(
            verdict_for(&BTreeSet::new(), true),
            CompareVerdict::Same
        );
    }
}
