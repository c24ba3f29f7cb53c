// SPDX-License-Identifier: MIT OR Apache-2.0

//! The demo signer.
//!
//! Exists for fixtures and tests only, and refuses to construct unless
//! `WEFTEND_ALLOW_DEMO_CRYPTO` was captured at process start. Seeded
//! construction keeps fixtures deterministic; random generation is for
//! local experimentation.

use crate::keys::{AllowlistedKey, encode_hex};
use ed25519_dalek::Signer as _;
use weft_core::{EnvConfig, ManifestBody, ManifestSignature, ReleaseManifest};

/// Errors from demo signing.
#[derive(Debug, thiserror::Error)]
pub enum DemoCryptoError {
    /// The demo signer gate is closed.
    #[error("demo crypto is disabled; set WEFTEND_ALLOW_DEMO_CRYPTO=1")]
    Disabled,
    /// The manifest body could not be canonicalized for signing.
    #[error(transparent)]
    Contract(#[from] weft_core::ContractError),
}

/// A gated Ed25519 signer. Never serializes its private key.
pub struct DemoSigner {
    signing_key: ed25519_dalek::SigningKey,
    key_id: String,
}

impl std::fmt::Debug for DemoSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl DemoSigner {
    /// Deterministic signer from a fixed seed.
    ///
    /// # Errors
    ///
    /// Returns [`DemoCryptoError::Disabled`] unless the env gate is open.
    pub fn from_seed(
        config: &EnvConfig,
        seed: [u8; 32],
        key_id: impl Into<String>,
    ) -> Result<Self, DemoCryptoError> {
        if !config.allow_demo_crypto {
            return Err(DemoCryptoError::Disabled);
        }
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&seed),
            key_id: key_id.into(),
        })
    }

    /// Random signer for local experimentation.
    ///
    /// # Errors
    ///
    /// Returns [`DemoCryptoError::Disabled`] unless the env gate is open.
    pub fn generate(
        config: &EnvConfig,
        key_id: impl Into<String>,
    ) -> Result<Self, DemoCryptoError> {
        if !config.allow_demo_crypto {
            return Err(DemoCryptoError::Disabled);
        }
        let mut csprng = rand::rngs::OsRng;
        Ok(Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
            key_id: key_id.into(),
        })
    }

    /// The allowlist entry for this signer's public key.
    #[must_use]
    pub fn allowlist_entry(&self) -> AllowlistedKey {
        AllowlistedKey {
            key_id: self.key_id.clone(),
            algo: "ed25519".to_string(),
            public_key_hex: encode_hex(self.signing_key.verifying_key().as_bytes()),
        }
    }

    /// Sign a manifest body over its canonical bytes.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn sign_body(&self, body: &ManifestBody) -> Result<ManifestSignature, DemoCryptoError> {
        let message = weft_canon::canonical_json(body).map_err(weft_core::ContractError::Canon)?;
        let signature = self.signing_key.sign(message.as_bytes());
        Ok(ManifestSignature {
            key_id: self.key_id.clone(),
            algo: "ed25519".to_string(),
            sig: encode_hex(&signature.to_bytes()),
        })
    }

    /// Mint a fully signed release manifest from a body.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn sign_release(&self, body: ManifestBody) -> Result<ReleaseManifest, DemoCryptoError> {
        let signature = self.sign_body(&body)?;
        Ok(ReleaseManifest {
            release_id: ReleaseManifest::compute_release_id(&body)?,
            manifest_body: body,
            signatures: vec![signature],
        })
    }
}
