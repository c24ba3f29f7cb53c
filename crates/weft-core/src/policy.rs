// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trust policies.
//!
//! A policy is a list of rules; each rule selects target nodes, demands an
//! evidence expression, and grants a capability set when the expression
//! holds. Evaluation lives in `weft-policy`; this module owns the shapes.

use crate::ContractError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_canon::CanonError;

/// A capability with optional parameters.
///
/// Sorted everywhere by `(capId, canonical(params))`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CapabilityGrant {
    /// Capability id, e.g. `fs.read`, `net.fetch`, `id.sign`.
    pub cap_id: String,
    /// Optional capability parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A capability request has the same shape as a grant.
pub type CapabilityRequest = CapabilityGrant;

impl CapabilityGrant {
    /// Build a parameterless grant.
    #[must_use]
    pub fn new(cap_id: impl Into<String>) -> Self {
        Self {
            cap_id: cap_id.into(),
            params: None,
        }
    }

    /// The canonical sort key `(capId, canonical(params))`.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization of the params.
    pub fn sort_key(&self) -> Result<String, CanonError> {
        let params = match &self.params {
            Some(v) => weft_canon::canonical_string(v)?,
            None => "null".to_string(),
        };
        Ok(format!("{}\u{0}{params}", self.cap_id))
    }
}

/// Sort a grant set by `(capId, canonical(params))` and drop duplicates.
///
/// # Errors
///
/// Propagates canonicalization failures.
pub fn sort_grants(grants: &mut Vec<CapabilityGrant>) -> Result<(), CanonError> {
    weft_canon::sort::sort_by_canonical_key(grants, CapabilityGrant::sort_key)?;
    grants.dedup();
    Ok(())
}

/// An evidence expression: the requirement side of a trust rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum EvidenceExpr {
    /// Every child must hold.
    AllOf(Vec<EvidenceExpr>),
    /// At least one child must hold.
    AnyOf(Vec<EvidenceExpr>),
    /// A record of this kind must bind to the rule's target.
    Kind(String),
}

impl EvidenceExpr {
    /// Collect every kind mentioned anywhere in the expression, sorted.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        fn walk(expr: &EvidenceExpr, out: &mut Vec<String>) {
            match expr {
                EvidenceExpr::AllOf(children) | EvidenceExpr::AnyOf(children) => {
                    for child in children {
                        walk(child, out);
                    }
                }
                EvidenceExpr::Kind(k) => out.push(k.clone()),
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        weft_canon::sort::sort_unique_strings(&mut out);
        out
    }
}

/// Which graph nodes a rule applies to. Absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleSelector {
    /// Match a specific node id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Match a specific content hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl RuleSelector {
    /// Returns `true` if the selector matches the given node identity.
    #[must_use]
    pub fn matches(&self, node_id: &str, content_hash: &str) -> bool {
        self.node_id.as_deref().is_none_or(|id| id == node_id)
            && self
                .content_hash
                .as_deref()
                .is_none_or(|h| h == content_hash)
    }
}

/// One trust rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrustRule {
    /// Target selector.
    #[serde(rename = "match", default)]
    pub selector: RuleSelector,
    /// The evidence expression that must hold.
    pub requires: EvidenceExpr,
    /// Capabilities granted when the expression holds.
    pub grants: Vec<CapabilityGrant>,
}

/// A trust policy: an id, an optional preset name, and the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TrustPolicy {
    /// Stable policy identifier.
    pub policy_id: String,
    /// Optional preset this policy was derived from (canonical name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// The rules, evaluated in canonical order.
    pub rules: Vec<TrustRule>,
}

/// Normalize a policy preset alias to its canonical name.
///
/// `trusted-code` is an accepted alias of `trusted-only`; receipts only ever
/// carry the canonical name.
#[must_use]
pub fn normalize_preset(preset: &str) -> &str {
    match preset {
        "trusted-code" => "trusted-only",
        other => other,
    }
}

impl TrustPolicy {
    /// SHA-256 digest of the canonical policy.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn policy_digest(&self) -> Result<String, ContractError> {
        Ok(weft_canon::digest_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evidence_expr_wire_shape() {
        let expr = EvidenceExpr::AllOf(vec![
            EvidenceExpr::Kind("build.provenance".to_string()),
            EvidenceExpr::AnyOf(vec![EvidenceExpr::Kind("scan.av".to_string())]),
        ]);
        let j = serde_json::to_value(&expr).expect("serialize");
        assert_eq!(
            j,
            json!({"allOf": [
                {"kind": "build.provenance"},
                {"anyOf": [{"kind": "scan.av"}]},
            ]})
        );
    }

    #[test]
    fn expr_kinds_are_sorted_unique() {
        let expr = EvidenceExpr::AllOf(vec![
            EvidenceExpr::Kind("z".to_string()),
            EvidenceExpr::AnyOf(vec![
                EvidenceExpr::Kind("a".to_string()),
                EvidenceExpr::Kind("z".to_string()),
            ]),
        ]);
        assert_eq!(expr.kinds(), vec!["a", "z"]);
    }

    #[test]
    fn grants_sort_by_cap_then_params() {
        let mut grants = vec![
            CapabilityGrant {
                cap_id: "net.fetch".to_string(),
                params: Some(json!({"host": "b"})),
            },
            CapabilityGrant {
                cap_id: "net.fetch".to_string(),
                params: Some(json!({"host": "a"})),
            },
            CapabilityGrant::new("fs.read"),
            CapabilityGrant::new("fs.read"),
        ];
        sort_grants(&mut grants).expect("sort");
        assert_eq!(grants.len(), 3);
        assert_eq!(grants[0].cap_id, "fs.read");
        assert_eq!(grants[1].params.as_ref().expect("params")["host"], "a");
    }

    #[test]
    fn selector_absent_fields_match_everything() {
        let all = RuleSelector::default();
        assert!(all.matches("n1", "sha256:aa"));

        let by_node = RuleSelector {
            node_id: Some("n1".to_string()),
            content_hash: None,
        };
        assert!(by_node.matches("n1", "sha256:bb"));
        assert!(!by_node.matches("n2", "sha256:bb"));
    }

    #[test]
    fn preset_alias_normalizes() {
        assert_eq!(normalize_preset("trusted-code"), "trusted-only");
        assert_eq!(normalize_preset("trusted-only"), "trusted-only");
        assert_eq!(normalize_preset("open"), "open");
    }

    #[test]
    fn policy_digest_is_stable() {
        let policy = TrustPolicy {
            policy_id: "p1".to_string(),
            preset: None,
            rules: vec![TrustRule {
                selector: RuleSelector::default(),
                requires: EvidenceExpr::Kind("build.provenance".to_string()),
                grants: vec![CapabilityGrant::new("fs.read")],
            }],
        };
        assert_eq!(
            policy.policy_digest().expect("digest"),
            policy.policy_digest().expect("digest")
        );
    }
}
