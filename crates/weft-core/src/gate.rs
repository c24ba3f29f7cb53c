// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gate receipts.
//!
//! A gate receipt is minted by a market admission gate and presented to the
//! kernel at invoke time. Identity law: `receiptId` is the digest of the
//! canonical receipt with the id absent.

use crate::ContractError;
use crate::kinds::GateDecision;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An admission decision bound to a market, plan, release, and block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateReceipt {
    /// The admitting gate.
    pub gate_id: String,
    /// The market the gate admits into.
    pub market_id: String,
    /// Digest of the market's policy.
    pub market_policy_digest: String,
    /// The admitted plan.
    pub plan_digest: String,
    /// The admitted release.
    pub release_id: String,
    /// The admitted block.
    pub block_hash: String,
    /// The decision.
    pub decision: GateDecision,
    /// Sorted unique reason codes behind the decision.
    pub reason_codes: Vec<String>,
    /// Digest of the gate's checkpoint state.
    pub checkpoint_digest: String,
    /// Identity digest; `None` until minted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
}

impl GateReceipt {
    /// Compute the identity digest with the id field absent.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn compute_id(&self) -> Result<String, ContractError> {
        crate::digest_with_field_nulled(self, "receiptId")
    }

    /// Return the receipt with its identity digest attached.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn with_id(mut self) -> Result<Self, ContractError> {
        self.receipt_id = Some(self.compute_id()?);
        Ok(self)
    }

    /// Check the stored id against the recomputed one.
    ///
    /// # Errors
    ///
    /// [`ContractError::DigestAbsent`] when unset,
    /// [`ContractError::DigestMismatch`] when stale.
    pub fn verify_id(&self) -> Result<(), ContractError> {
        let stored = self
            .receipt_id
            .as_deref()
            .ok_or(ContractError::DigestAbsent)?;
        let computed = self.compute_id()?;
        if stored == computed {
            Ok(())
        } else {
            Err(ContractError::DigestMismatch {
                stored: stored.to_string(),
                computed,
            })
        }
    }
}
