// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-policy
//!
//! Turns a graph manifest, an evidence set, and a trust policy into the set
//! of eligible capabilities and a digested execution plan.
//!
//! The evaluation is deterministic end to end: inputs are sorted by
//! canonical key before any rule runs, children of an expression are
//! evaluated in their canonical order, and an unknown evidence kind fails
//! the rule closed: the capability never becomes a runtime candidate.

/// Execution plans and the plan-digest law.
pub mod plan;
/// The kind-keyed evidence verifier registry.
pub mod registry;

pub use plan::{ExecutionPlan, PlanNode};
pub use registry::{EvidenceVerifier, VerifierRegistry};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_canon::sort::ReasonEntry;
use weft_core::{
    CapabilityGrant, EvidenceExpr, EvidenceRecord, Issue, TrustPolicy, TrustRule, codes,
    evidence::sort_evidence_set, issue::into_result, policy::sort_grants,
};

/// One node of the build graph under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphNode {
    /// Stable node id, unique within the manifest.
    pub node_id: String,
    /// Content hash of the node's bytes.
    pub content_hash: String,
    /// Optional role label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// The graph manifest: the nodes evaluation ranges over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphManifest {
    /// The nodes; ids must be unique.
    pub nodes: Vec<GraphNode>,
}

/// The trust verdict: per-node eligible grants plus the reasons that
/// explain every failed requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustResult {
    /// Eligible grants per node id, each list sorted and unique.
    pub eligible_by_node: BTreeMap<String, Vec<CapabilityGrant>>,
    /// Sorted unique reasons behind every requirement that did not hold.
    pub reasons: Vec<ReasonEntry>,
}

impl TrustResult {
    /// Returns `true` when `cap_id` is eligible for `node_id`.
    #[must_use]
    pub fn is_eligible(&self, node_id: &str, cap_id: &str) -> bool {
        self.eligible_by_node
            .get(node_id)
            .is_some_and(|grants| grants.iter().any(|g| g.cap_id == cap_id))
    }
}

/// The full outcome: trust result, plan, and the plan digest.
#[derive(Debug, Clone)]
pub struct TrustOutcome {
    /// The trust verdict.
    pub result: TrustResult,
    /// The canonical execution plan.
    pub plan: ExecutionPlan,
    /// `digest(canonical(plan))`.
    pub plan_digest: String,
}

/// Evaluate a policy over a manifest and an evidence set.
///
/// # Errors
///
/// Returns issues when the manifest itself is malformed (duplicate node
/// ids) or when canonicalization fails. Requirement failures are not
/// errors; they surface as reasons on the [`TrustResult`].
pub fn evaluate(
    manifest: &GraphManifest,
    evidence: &[EvidenceRecord],
    policy: &TrustPolicy,
    registry: &VerifierRegistry,
) -> Result<TrustOutcome, Vec<Issue>> {
    let mut issues = Vec::new();

    let mut seen_ids = std::collections::BTreeSet::new();
    for node in &manifest.nodes {
        if !seen_ids.insert(node.node_id.as_str()) {
            issues.push(Issue::with_detail(
                codes::FIELD_INVALID,
                "$.nodes",
                format!("duplicate node id {}", node.node_id),
            ));
        }
    }
    into_result((), issues)?;

    let mut evidence = evidence.to_vec();
    sort_evidence_set(&mut evidence).map_err(canon_issue)?;

    let mut rules = policy.rules.clone();
    weft_canon::sort::sort_by_canonical_key(&mut rules, |rule| {
        weft_canon::canonical_json(rule)
    })
    .map_err(canon_issue)?;

    let mut nodes: Vec<&GraphNode> = manifest.nodes.iter().collect();
    nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));

    let mut reasons: Vec<ReasonEntry> = Vec::new();
    let mut eligible_by_node: BTreeMap<String, Vec<CapabilityGrant>> = BTreeMap::new();

    for rule in &rules {
        let matched: Vec<&GraphNode> = nodes
            .iter()
            .copied()
            .filter(|n| rule.selector.matches(&n.node_id, &n.content_hash))
            .collect();

        let targeted =
            rule.selector.node_id.is_some() || rule.selector.content_hash.is_some();
        if targeted && matched.is_empty() {
            reasons.push(ReasonEntry::bare(codes::TRUST_PKG_MISSING));
            continue;
        }
        if rule.selector.node_id.is_none()
            && rule.selector.content_hash.is_some()
            && matched.len() > 1
        {
            reasons.push(ReasonEntry::bare(codes::TRUST_PKG_AMBIGUOUS));
            continue;
        }

        for node in matched {
            if eval_expr(&rule.requires, node, &evidence, registry, &mut reasons) {
                eligible_by_node
                    .entry(node.node_id.clone())
                    .or_default()
                    .extend(rule.grants.iter().cloned());
            }
        }
    }

    for grants in eligible_by_node.values_mut() {
        sort_grants(grants).map_err(canon_issue)?;
    }
    weft_canon::sort::sort_reason_entries(&mut reasons);

    let plan_nodes = manifest
        .nodes
        .iter()
        .map(|n| PlanNode {
            node_id: n.node_id.clone(),
            content_hash: n.content_hash.clone(),
        })
        .collect();
    let all_grants: Vec<CapabilityGrant> = eligible_by_node
        .values()
        .flat_map(|grants| grants.iter().cloned())
        .collect();
    let policy_digest = policy
        .policy_digest()
        .map_err(|e| vec![Issue::with_detail(codes::FIELD_INVALID, "$.policy", e.to_string())])?;
    let plan = ExecutionPlan::new(plan_nodes, all_grants, policy_digest)
        .map_err(|e| vec![Issue::with_detail(codes::FIELD_INVALID, "$.plan", e.to_string())])?;
    let plan_digest = plan
        .plan_digest()
        .map_err(|e| vec![Issue::with_detail(codes::FIELD_INVALID, "$.plan", e.to_string())])?;

    Ok(TrustOutcome {
        result: TrustResult {
            eligible_by_node,
            reasons,
        },
        plan,
        plan_digest,
    })
}

fn canon_issue(e: weft_canon::CanonError) -> Vec<Issue> {
    vec![Issue::with_detail(codes::CYCLE_IN_CANONICAL, "$", e.to_string())]
}

/// Evaluate one expression for one node. Children run in canonical order and
/// every failing branch records its reasons; a satisfied `anyOf` discards the
/// reasons of its failed siblings.
fn eval_expr(
    expr: &EvidenceExpr,
    node: &GraphNode,
    evidence: &[EvidenceRecord],
    registry: &VerifierRegistry,
    reasons: &mut Vec<ReasonEntry>,
) -> bool {
    match expr {
        EvidenceExpr::AllOf(children) => {
            let mut all = true;
            for child in children {
                if !eval_expr(child, node, evidence, registry, reasons) {
                    all = false;
                }
            }
            all
        }
        EvidenceExpr::AnyOf(children) => {
            let mut scratch = Vec::new();
            for child in children {
                if eval_expr(child, node, evidence, registry, &mut scratch) {
                    return true;
                }
            }
            reasons.append(&mut scratch);
            false
        }
        EvidenceExpr::Kind(kind) => {
            if !registry.knows(kind) {
                reasons.push(ReasonEntry::with_subject(codes::EVIDENCE_MISSING, kind));
                return false;
            }
            let candidates: Vec<&EvidenceRecord> = evidence
                .iter()
                .filter(|rec| {
                    rec.kind == *kind
                        && rec.subject.node_id == node.node_id
                        && rec.subject.content_hash == node.content_hash
                })
                .collect();
            if candidates.is_empty() {
                reasons.push(ReasonEntry::with_subject(codes::EVIDENCE_MISSING, kind));
                return false;
            }
            let verifier = registry.get(kind).expect("registered kind has a verifier");
            let mut rejected = Vec::new();
            for rec in candidates {
                let verdict = verifier.verify(rec);
                if verdict.is_empty() {
                    return true;
                }
                rejected.extend(
                    verdict
                        .into_iter()
                        .map(|code| ReasonEntry::with_subject(code, kind)),
                );
            }
            reasons.append(&mut rejected);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_core::evidence::EvidenceSubject;
    use weft_core::policy::RuleSelector;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            node_id: id.to_string(),
            content_hash: weft_canon::sha256_digest(id.as_bytes()),
            role: None,
        }
    }

    fn evidence_for(node: &GraphNode, kind: &str) -> EvidenceRecord {
        EvidenceRecord {
            kind: kind.to_string(),
            issuer: "shop-a".to_string(),
            subject: EvidenceSubject {
                node_id: node.node_id.clone(),
                content_hash: node.content_hash.clone(),
            },
            payload: json!({}),
            evidence_id: None,
        }
        .with_id()
        .expect("mint")
    }

    fn policy_granting(requires: EvidenceExpr, caps: &[&str]) -> TrustPolicy {
        TrustPolicy {
            policy_id: "p1".to_string(),
            preset: None,
            rules: vec![TrustRule {
                selector: RuleSelector::default(),
                requires,
                grants: caps
                    .iter()
                    .map(|c| CapabilityGrant::new(c.to_string()))
                    .collect(),
            }],
        }
    }

    #[test]
    fn satisfied_kind_grants_capability() {
        let n = node("n1");
        let manifest = GraphManifest {
            nodes: vec![n.clone()],
        };
        let evidence = vec![evidence_for(&n, "build.provenance")];
        let policy = policy_granting(
            EvidenceExpr::Kind("build.provenance".to_string()),
            &["fs.read"],
        );
        let outcome = evaluate(
            &manifest,
            &evidence,
            &policy,
            &VerifierRegistry::default(),
        )
        .expect("evaluate");
        assert!(outcome.result.is_eligible("n1", "fs.read"));
        assert!(outcome.result.reasons.is_empty());
        assert_eq!(outcome.plan.grants.len(), 1);
    }

    #[test]
    fn missing_evidence_keeps_cap_set_empty() {
        let n = node("n1");
        let manifest = GraphManifest {
            nodes: vec![n.clone()],
        };
        let policy = policy_granting(
            EvidenceExpr::Kind("build.provenance".to_string()),
            &["fs.read"],
        );
        let outcome =
            evaluate(&manifest, &[], &policy, &VerifierRegistry::default()).expect("evaluate");
        assert!(!outcome.result.is_eligible("n1", "fs.read"));
        assert_eq!(
            outcome.result.reasons,
            vec![ReasonEntry::with_subject(
                codes::EVIDENCE_MISSING,
                "build.provenance"
            )]
        );
        assert!(outcome.plan.grants.is_empty());
    }

    #[test]
    fn unknown_required_kind_fails_closed() {
        let n = node("n1");
        let manifest = GraphManifest {
            nodes: vec![n.clone()],
        };
        // The record exists, but no verifier knows its kind.
        let evidence = vec![evidence_for(&n, "totally.new")];
        let policy = policy_granting(
            EvidenceExpr::Kind("totally.new".to_string()),
            &["fs.read"],
        );
        let outcome = evaluate(
            &manifest,
            &evidence,
            &policy,
            &VerifierRegistry::default(),
        )
        .expect("evaluate");
        assert!(!outcome.result.is_eligible("n1", "fs.read"));
        assert!(outcome.result.reasons.iter().any(|r| {
            r.code == codes::EVIDENCE_MISSING && r.subject.as_deref() == Some("totally.new")
        }));
    }

    #[test]
    fn all_of_requires_every_child() {
        let n = node("n1");
        let manifest = GraphManifest {
            nodes: vec![n.clone()],
        };
        let evidence = vec![evidence_for(&n, "build.provenance")];
        let policy = policy_granting(
            EvidenceExpr::AllOf(vec![
                EvidenceExpr::Kind("build.provenance".to_string()),
                EvidenceExpr::Kind("scan.av".to_string()),
            ]),
            &["fs.read"],
        );
        let outcome = evaluate(
            &manifest,
            &evidence,
            &policy,
            &VerifierRegistry::default(),
        )
        .expect("evaluate");
        assert!(!outcome.result.is_eligible("n1", "fs.read"));
    }

    #[test]
    fn any_of_accepts_one_child_and_drops_sibling_reasons() {
        let n = node("n1");
        let manifest = GraphManifest {
            nodes: vec![n.clone()],
        };
        let evidence = vec![evidence_for(&n, "scan.av")];
        let policy = policy_granting(
            EvidenceExpr::AnyOf(vec![
                EvidenceExpr::Kind("build.provenance".to_string()),
                EvidenceExpr::Kind("scan.av".to_string()),
            ]),
            &["fs.read"],
        );
        let outcome = evaluate(
            &manifest,
            &evidence,
            &policy,
            &VerifierRegistry::default(),
        )
        .expect("evaluate");
        assert!(outcome.result.is_eligible("n1", "fs.read"));
        assert!(outcome.result.reasons.is_empty());
    }

    #[test]
    fn targeted_rule_with_no_match_reports_pkg_missing() {
        let manifest = GraphManifest {
            nodes: vec![node("n1")],
        };
        let mut policy = policy_granting(
            EvidenceExpr::Kind("build.provenance".to_string()),
            &["fs.read"],
        );
        policy.rules[0].selector = RuleSelector {
            node_id: Some("ghost".to_string()),
            content_hash: None,
        };
        let outcome =
            evaluate(&manifest, &[], &policy, &VerifierRegistry::default()).expect("evaluate");
        assert_eq!(
            outcome.result.reasons,
            vec![ReasonEntry::bare(codes::TRUST_PKG_MISSING)]
        );
    }

    #[test]
    fn ambiguous_content_hash_selector_fails_closed() {
        let shared = weft_canon::sha256_digest(b"same-bytes");
        let manifest = GraphManifest {
            nodes: vec![
                GraphNode {
                    node_id: "n1".to_string(),
                    content_hash: shared.clone(),
                    role: None,
                },
                GraphNode {
                    node_id: "n2".to_string(),
                    content_hash: shared.clone(),
                    role: None,
                },
            ],
        };
        let mut policy = policy_granting(
            EvidenceExpr::Kind("build.provenance".to_string()),
            &["fs.read"],
        );
        policy.rules[0].selector = RuleSelector {
            node_id: None,
            content_hash: Some(shared),
        };
        let outcome =
            evaluate(&manifest, &[], &policy, &VerifierRegistry::default()).expect("evaluate");
        assert_eq!(
            outcome.result.reasons,
            vec![ReasonEntry::bare(codes::TRUST_PKG_AMBIGUOUS)]
        );
        assert!(outcome.result.eligible_by_node.is_empty());
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let manifest = GraphManifest {
            nodes: vec![node("n1"), node("n1")],
        };
        let policy = policy_granting(
            EvidenceExpr::Kind("build.provenance".to_string()),
            &["fs.read"],
        );
        let issues = evaluate(&manifest, &[], &policy, &VerifierRegistry::default())
            .expect_err("duplicate");
        assert_eq!(issues[0].code, codes::FIELD_INVALID);
    }

    #[test]
    fn evaluation_is_deterministic_under_input_order() {
        let a = node("a");
        let b = node("b");
        let evidence = vec![
            evidence_for(&b, "build.provenance"),
            evidence_for(&a, "build.provenance"),
        ];
        let policy = policy_granting(
            EvidenceExpr::Kind("build.provenance".to_string()),
            &["fs.read", "net.fetch"],
        );
        let registry = VerifierRegistry::default();

        let m1 = GraphManifest {
            nodes: vec![a.clone(), b.clone()],
        };
        let m2 = GraphManifest {
            nodes: vec![b.clone(), a.clone()],
        };
        let mut rev = evidence.clone();
        rev.reverse();

        let o1 = evaluate(&m1, &evidence, &policy, &registry).expect("evaluate");
        let o2 = evaluate(&m2, &rev, &policy, &registry).expect("evaluate");
        assert_eq!(o1.plan_digest, o2.plan_digest);
        assert_eq!(o1.result.eligible_by_node, o2.result.eligible_by_node);
    }
}
