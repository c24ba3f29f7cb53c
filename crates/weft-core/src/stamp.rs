// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shop stamps.

use crate::ContractError;
use crate::kinds::{AcceptDecision, Tier};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A shop's tier stamp on a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ShopStamp {
    /// Stamped tier.
    pub tier: Tier,
    /// Stamping shop id.
    pub shop_id: String,
    /// The stamped block.
    pub block_hash: String,
    /// Policy the shop evaluated under.
    pub policy_digest: String,
    /// The shop's decision.
    pub accept_decision: AcceptDecision,
    /// Sorted unique reason codes behind the decision.
    pub reason_codes: Vec<String>,
    /// Identity digest; `None` until sealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stamp_digest: Option<String>,
    /// Hex signature over the canonical stamp (digest field absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ShopStamp {
    /// Compute the identity digest with the digest and signature absent.
    ///
    /// The signature covers the digested form, so both fields are excluded.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn compute_digest(&self) -> Result<String, ContractError> {
        let mut v = weft_canon::canonical_value(self)?;
        if let serde_json::Value::Object(map) = &mut v {
            map.insert("stampDigest".to_string(), serde_json::Value::Null);
            map.insert("signature".to_string(), serde_json::Value::Null);
        }
        Ok(weft_canon::sha256_digest(
            weft_canon::canonical_string(&v)?.as_bytes(),
        ))
    }

    /// Return the stamp with its identity digest attached.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn with_digest(mut self) -> Result<Self, ContractError> {
        self.stamp_digest = Some(self.compute_digest()?);
        Ok(self)
    }

    /// Check the stored digest against the recomputed one.
    ///
    /// # Errors
    ///
    /// [`ContractError::DigestAbsent`] when unset,
    /// [`ContractError::DigestMismatch`] when stale.
    pub fn verify_digest(&self) -> Result<(), ContractError> {
        let stored = self
            .stamp_digest
            .as_deref()
            .ok_or(ContractError::DigestAbsent)?;
        let computed = self.compute_digest()?;
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
