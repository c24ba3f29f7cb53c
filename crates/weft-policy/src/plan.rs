// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution plans.
//!
//! Plan binding law: `planDigest = digest(canonical(plan))` where the plan is
//! the sorted node set, the sorted grant set, and the policy digest.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use weft_core::{CapabilityGrant, ContractError, policy::sort_grants};

/// One executable node in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanNode {
    /// Stable node id.
    pub node_id: String,
    /// Content hash of the node.
    pub content_hash: String,
}

/// The canonical execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExecutionPlan {
    /// Nodes sorted by `nodeId`.
    pub nodes: Vec<PlanNode>,
    /// Grants sorted by `(capId, canonical(params))`.
    pub grants: Vec<CapabilityGrant>,
    /// Digest of the policy the plan was evaluated under.
    pub policy_digest: String,
}

impl ExecutionPlan {
    /// Build a plan, enforcing both sort invariants.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization of grant params.
    pub fn new(
        mut nodes: Vec<PlanNode>,
        mut grants: Vec<CapabilityGrant>,
        policy_digest: String,
    ) -> Result<Self, ContractError> {
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        nodes.dedup();
        sort_grants(&mut grants).map_err(ContractError::Canon)?;
        Ok(Self {
            nodes,
            grants,
            policy_digest,
        })
    }

    /// `digest(canonical(plan))`.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn plan_digest(&self) -> Result<String, ContractError> {
        Ok(weft_canon::digest_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> PlanNode {
        PlanNode {
            node_id: id.to_string(),
            content_hash: weft_canon::sha256_digest(id.as_bytes()),
        }
    }

    #[test]
    fn plan_sorts_nodes_and_grants() {
        let plan = ExecutionPlan::new(
            vec![node("b"), node("a")],
            vec![
                CapabilityGrant::new("net.fetch"),
                CapabilityGrant::new("fs.read"),
            ],
            weft_canon::sha256_digest(b"policy"),
        )
        .expect("plan");
        assert_eq!(plan.nodes[0].node_id, "a");
        assert_eq!(plan.grants[0].cap_id, "fs.read");
    }

    #[test]
    fn plan_digest_is_input_order_independent() {
        let digest_of = |nodes: Vec<PlanNode>, grants: Vec<CapabilityGrant>| {
            ExecutionPlan::new(nodes, grants, weft_canon::sha256_digest(b"policy"))
                .expect("plan")
                .plan_digest()
                .expect("digest")
        };
        let a = digest_of(
            vec![node("x"), node("y")],
            vec![
                CapabilityGrant::new("fs.read"),
                CapabilityGrant::new("net.fetch"),
            ],
        );
        let b = digest_of(
            vec![node("y"), node("x")],
            vec![
                CapabilityGrant::new("net.fetch"),
                CapabilityGrant::new("fs.read"),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn plan_digest_changes_with_grants() {
        let base = ExecutionPlan::new(
            vec![node("x")],
            vec![CapabilityGrant::new("fs.read")],
            weft_canon::sha256_digest(b"policy"),
        )
        .expect("plan");
        let widened = ExecutionPlan::new(
            vec![node("x")],
            vec![
                CapabilityGrant::new("fs.read"),
                CapabilityGrant::new("net.fetch"),
            ],
            weft_canon::sha256_digest(b"policy"),
        )
        .expect("plan");
        assert_ne!(
            base.plan_digest().expect("digest"),
            widened.plan_digest().expect("digest")
        );
    }
}
