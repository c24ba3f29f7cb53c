// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests over the identity laws.

use proptest::prelude::*;
use serde_json::json;
use weft_core::evidence::{EvidenceRecord, EvidenceSubject, sort_evidence_set};
use weft_core::release::{ManifestBody, ReleaseManifest};

fn arb_record() -> impl Strategy<Value = EvidenceRecord> {
    (
        "[a-z.]{1,16}",
        "[a-z0-9-]{1,16}",
        "[a-z0-9-]{1,12}",
        "[a-f0-9]{8}",
        any::<bool>(),
    )
        .prop_map(|(kind, issuer, node, hash, flag)| EvidenceRecord {
            kind,
            issuer,
            subject: EvidenceSubject {
                node_id: node,
                content_hash: format!("sha256:{hash}"),
            },
            payload: json!({ "ok": flag }),
            evidence_id: None,
        })
}

proptest! {
    #[test]
    fn evidence_id_law_holds_for_any_record(record in arb_record()) {
        let minted = record.with_id().expect("mint");
        minted.verify_id().expect("law holds");
        // Minting again never changes the id.
        let again = minted.clone().with_id().expect("re-mint");
        prop_assert_eq!(minted.evidence_id, again.evidence_id);
    }

    #[test]
    fn evidence_sets_sort_identically_from_any_order(
        mut records in prop::collection::vec(arb_record(), 0..8),
    ) {
        let mut reversed: Vec<_> = records.clone();
        reversed.reverse();
        sort_evidence_set(&mut records).expect("sort");
        sort_evidence_set(&mut reversed).expect("sort");
        prop_assert_eq!(records, reversed);
    }

    #[test]
    fn release_id_law_holds_for_any_body(
        blocks in prop::collection::vec("[a-z0-9-]{1,12}", 0..6),
    ) {
        let body = ManifestBody {
            plan_digest: weft_canon::sha256_digest(b"plan"),
            policy_digest: weft_canon::sha256_digest(b"policy"),
            blocks,
            artifact_digests: vec![],
            evidence_digests: vec![],
        };
        let manifest = ReleaseManifest {
            release_id: ReleaseManifest::compute_release_id(&body).expect("id"),
            manifest_body: body,
            signatures: vec![],
        };
        manifest.verify_id().expect("law holds");
    }
}
