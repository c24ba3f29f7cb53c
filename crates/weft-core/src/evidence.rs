// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence records.
//!
//! An evidence record is a bindable envelope: a verifier keyed by `kind`
//! turns it into an eligibility claim during policy evaluation. Identity law:
//! `evidenceId = digest(canonical(record \ {evidenceId}))`.

use crate::ContractError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use weft_canon::CanonError;

/// What an evidence record binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvidenceSubject {
    /// Stable node id inside the graph manifest.
    pub node_id: String,
    /// Content hash of the bound node.
    pub content_hash: String,
}

/// A single evidence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvidenceRecord {
    /// Evidence kind, the dispatch key for verifiers.
    pub kind: String,
    /// Issuing authority.
    pub issuer: String,
    /// The bound subject.
    pub subject: EvidenceSubject,
    /// Kind-specific payload.
    pub payload: Value,
    /// Identity digest; `None` until minted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_id: Option<String>,
}

impl EvidenceRecord {
    /// Compute the identity digest per the evidence id law.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn compute_id(&self) -> Result<String, ContractError> {
        crate::digest_with_field_nulled(self, "evidenceId")
    }

    /// Return the record with its identity digest attached.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn with_id(mut self) -> Result<Self, ContractError> {
        self.evidence_id = Some(self.compute_id()?);
        Ok(self)
    }

    /// Check the stored id against the recomputed one.
    ///
    /// # Errors
    ///
    /// [`ContractError::DigestAbsent`] when no id is stored,
    /// [`ContractError::DigestMismatch`] when it does not recompute.
    pub fn verify_id(&self) -> Result<(), ContractError> {
        let stored = self
            .evidence_id
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

    /// The canonical sort key for evidence sets.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization of the payload.
    pub fn sort_key(&self) -> Result<String, CanonError> {
        Ok(format!(
            "{}\u{0}{}\u{0}{}\u{0}{}\u{0}{}",
            self.kind,
            self.issuer,
            self.subject.node_id,
            self.subject.content_hash,
            weft_canon::canonical_string(&self.payload)?
        ))
    }
}

/// Sort an evidence set by `(kind, issuer, nodeId, contentHash,
/// canonical(payload))`.
///
/// # Errors
///
/// Propagates canonicalization failures.
pub fn sort_evidence_set(records: &mut Vec<EvidenceRecord>) -> Result<(), CanonError> {
    weft_canon::sort::sort_by_canonical_key(records, EvidenceRecord::sort_key)
}
