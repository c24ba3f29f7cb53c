// SPDX-License-Identifier: MIT OR Apache-2.0

//! Release manifests and runtime bundles.
//!
//! Identity law: `releaseId = digest(canonical(manifestBody))`. The bundle's
//! digest is computed with the digest field absent and is bound to the plan
//! digest it carries.

use crate::ContractError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A detached signature over the manifest body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestSignature {
    /// Which allowlisted key signed.
    pub key_id: String,
    /// Signature algorithm, e.g. `ed25519`.
    pub algo: String,
    /// Hex-encoded signature bytes.
    pub sig: String,
}

/// The signed body of a release manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestBody {
    /// Digest of the execution plan this release ships.
    pub plan_digest: String,
    /// Digest of the policy the plan was evaluated under.
    pub policy_digest: String,
    /// Block hashes in the release, sorted.
    pub blocks: Vec<String>,
    /// Store digests of every declared artifact, sorted.
    pub artifact_digests: Vec<String>,
    /// Evidence ids the release binds, sorted.
    pub evidence_digests: Vec<String>,
}

/// A release manifest: identity, body, signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReleaseManifest {
    /// `digest(canonical(manifestBody))`.
    pub release_id: String,
    /// The signed body.
    pub manifest_body: ManifestBody,
    /// Signatures over the canonical body.
    pub signatures: Vec<ManifestSignature>,
}

impl ReleaseManifest {
    /// Compute the release id from the body.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn compute_release_id(body: &ManifestBody) -> Result<String, ContractError> {
        Ok(weft_canon::digest_value(body)?)
    }

    /// Check the stored id against the recomputed one.
    ///
    /// # Errors
    ///
    /// [`ContractError::DigestMismatch`] when the id does not recompute.
    pub fn verify_id(&self) -> Result<(), ContractError> {
        let computed = Self::compute_release_id(&self.manifest_body)?;
        if self.release_id == computed {
            Ok(())
        } else {
            Err(ContractError::DigestMismatch {
                stored: self.release_id.clone(),
                computed,
            })
        }
    }
}

/// The runtime bundle: the canonical plan plus the digests execution needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuntimeBundle {
    /// The canonical execution plan as a JSON tree.
    pub plan: Value,
    /// Digest of the canonical plan.
    pub plan_digest: String,
    /// Block hashes shipped by the bundle, sorted.
    pub blocks: Vec<String>,
    /// Store digests of the bundle's artifacts, sorted.
    pub artifact_digests: Vec<String>,
    /// Optional digest over the bundle's path layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_digest: Option<String>,
    /// Identity digest; `None` until sealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_digest: Option<String>,
}

impl RuntimeBundle {
    /// Compute the identity digest with the digest field absent.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn compute_digest(&self) -> Result<String, ContractError> {
        crate::digest_with_field_nulled(self, "bundleDigest")
    }

    /// Return the bundle with its identity digest attached.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn with_digest(mut self) -> Result<Self, ContractError> {
        self.bundle_digest = Some(self.compute_digest()?);
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
            .bundle_digest
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> ManifestBody {
        ManifestBody {
            plan_digest: weft_canon::sha256_digest(b"plan"),
            policy_digest: weft_canon::sha256_digest(b"policy"),
            blocks: vec!["block-1".to_string(), "block-2".to_string()],
            artifact_digests: vec![weft_canon::sha256_digest(b"artifact")],
            evidence_digests: vec![],
        }
    }

    #[test]
    fn release_id_law_holds() {
        let b = body();
        let manifest = ReleaseManifest {
            release_id: ReleaseManifest::compute_release_id(&b).expect("id"),
            manifest_body: b,
            signatures: vec![],
        };
        manifest.verify_id().expect("verifies");
    }

    #[test]
    fn edited_body_breaks_release_id() {
        let b = body();
        let mut manifest = ReleaseManifest {
            release_id: ReleaseManifest::compute_release_id(&b).expect("id"),
            manifest_body: b,
            signatures: vec![],
        };
        manifest.manifest_body.blocks.push("block-3".to_string());
        assert!(matches!(
            manifest.verify_id(),
            Err(ContractError::DigestMismatch { .. })
        ));
    }

    #[test]
    fn bundle_digest_is_bound_to_plan() {
        let bundle = RuntimeBundle {
            plan: json!({"nodes": []}),
            plan_digest: weft_canon::sha256_digest(b"plan"),
            blocks: vec!["block-1".to_string()],
            artifact_digests: vec![],
            path_digest: None,
            bundle_digest: None,
        }
        .with_digest()
        .expect("seal");
        bundle.verify_digest().expect("verifies");

        let mut tampered = bundle.clone();
        tampered.plan_digest = weft_canon::sha256_digest(b"other-plan");
        assert!(matches!(
            tampered.verify_digest(),
            Err(ContractError::DigestMismatch { .. })
        ));
    }
}
