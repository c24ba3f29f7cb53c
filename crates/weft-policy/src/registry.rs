// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evidence verifier registry.
//!
//! Verifiers form a polymorphic family keyed by evidence kind. Unknown kinds
//! are values, not type failures: a rule that requires an unregistered kind
//! fails closed and the capability never becomes eligible.

use std::collections::BTreeMap;
use weft_core::{EvidenceRecord, codes};

/// Verdict of one verifier over one record: empty means accepted.
pub type VerifierReasons = Vec<String>;

/// A pluggable evidence verifier for a single kind.
pub trait EvidenceVerifier: Send + Sync {
    /// Verify a record, returning the reason codes of every failure.
    fn verify(&self, record: &EvidenceRecord) -> VerifierReasons;
}

/// Accepts any record whose identity digest holds.
#[derive(Debug, Default)]
pub struct BindingVerifier;

impl EvidenceVerifier for BindingVerifier {
    fn verify(&self, record: &EvidenceRecord) -> VerifierReasons {
        match record.verify_id() {
            Ok(()) => vec![],
            Err(_) => vec![codes::TRUST_HASH_MISMATCH.to_string()],
        }
    }
}

/// Requires a well-formed hex `signature` field in the payload, on top of
/// the identity binding. Cryptographic verification happens at release
/// level; this verifier gates eligibility on the envelope shape.
#[derive(Debug, Default)]
pub struct SignatureEnvelopeVerifier;

impl EvidenceVerifier for SignatureEnvelopeVerifier {
    fn verify(&self, record: &EvidenceRecord) -> VerifierReasons {
        let mut reasons = BindingVerifier.verify(record);
        match record.payload.get("signature").and_then(|v| v.as_str()) {
            None => reasons.push(codes::TRUST_SIGNATURE_REQUIRED.to_string()),
            Some(sig) => {
                let well_formed =
                    !sig.is_empty() && sig.len() % 2 == 0 && sig.chars().all(|c| c.is_ascii_hexdigit());
                if !well_formed {
                    reasons.push(codes::TRUST_SIGNATURE_INVALID.to_string());
                }
            }
        }
        weft_canon::sort::sort_reason_codes(&mut reasons);
        reasons
    }
}

/// The kind-keyed verifier registry.
pub struct VerifierRegistry {
    verifiers: BTreeMap<String, Box<dyn EvidenceVerifier>>,
}

impl std::fmt::Debug for VerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierRegistry")
            .field("kinds", &self.known_kinds())
            .finish()
    }
}

impl Default for VerifierRegistry {
    fn default() -> Self {
        Self::with_builtin_kinds()
    }
}

impl VerifierRegistry {
    /// An empty registry; every kind is unknown.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            verifiers: BTreeMap::new(),
        }
    }

    /// The registry with the built-in kinds installed.
    #[must_use]
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::empty();
        registry.register("build.provenance", Box::new(BindingVerifier));
        registry.register("scan.av", Box::new(BindingVerifier));
        registry.register("review.manual", Box::new(BindingVerifier));
        registry.register("sig.release", Box::new(SignatureEnvelopeVerifier));
        registry
    }

    /// Install a verifier for a kind, replacing any existing one.
    pub fn register(&mut self, kind: impl Into<String>, verifier: Box<dyn EvidenceVerifier>) {
        self.verifiers.insert(kind.into(), verifier);
    }

    /// Returns `true` when a verifier exists for `kind`.
    #[must_use]
    pub fn knows(&self, kind: &str) -> bool {
        self.verifiers.contains_key(kind)
    }

    /// Look up the verifier for a kind.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&dyn EvidenceVerifier> {
        self.verifiers.get(kind).map(AsRef::as_ref)
    }

    /// All registered kinds in deterministic order.
    #[must_use]
    pub fn known_kinds(&self) -> Vec<String> {
        self.verifiers.keys().cloned().collect()
    }
}
