// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing keys and the pinned allowlist.
//!
//! Public keys and signatures travel as lowercase hex strings. Private keys
//! never serialize: the signer type does not implement `Serialize`, and keys
//! live outside the source tree in an ignored local boundary.

use serde::{Deserialize, Serialize};

/// Errors from key parsing and signature checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// A hex field had the wrong length or non-hex characters.
    #[error("malformed hex: {0}")]
    MalformedHex(String),
    /// The bytes did not form a valid Ed25519 public key.
    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

/// An Ed25519 public key, hex-serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Parse from a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::MalformedHex`] on bad input.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let bytes = decode_hex(hex, 32)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Render as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        encode_hex(&self.0)
    }

    /// Convert to a dalek verifying key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidKey`] when the point is not on the curve.
    pub fn to_verifying_key(&self) -> Result<ed25519_dalek::VerifyingKey, KeyError> {
        ed25519_dalek::VerifyingKey::from_bytes(&self.0)
            .map_err(|e| KeyError::InvalidKey(e.to_string()))
    }
}

/// The signature-checking port the verifier calls through.
///
/// Hosts without crypto leave the port out; the verifier then reports
/// `MAYBE` instead of pretending the signatures were checked.
pub trait CryptoPort: Send + Sync {
    /// Verify `sig_hex` over `message` with `key`.
    fn verify(&self, key: &PublicKey, message: &[u8], sig_hex: &str) -> bool;
}

/// The Ed25519 port.
#[derive(Debug, Default)]
pub struct Ed25519Port;

impl CryptoPort for Ed25519Port {
    fn verify(&self, key: &PublicKey, message: &[u8], sig_hex: &str) -> bool {
        use ed25519_dalek::Verifier as _;
        let Ok(bytes) = decode_hex(sig_hex, 64) else {
            return false;
        };
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&bytes);
        let signature = ed25519_dalek::Signature::from_bytes(&arr);
        let Ok(verifying) = key.to_verifying_key() else {
            return false;
        };
        verifying.verify(message, &signature).is_ok()
    }
}

/// One pinned key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AllowlistedKey {
    /// Stable key id referenced by manifest signatures.
    pub key_id: String,
    /// Signature algorithm; only `ed25519` is recognized.
    pub algo: String,
    /// Lowercase hex public key.
    pub public_key_hex: String,
}

/// The pinned key allowlist shipped as `release_public_key.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyAllowlist {
    /// The pinned keys.
    pub keys: Vec<AllowlistedKey>,
}

impl KeyAllowlist {
    /// Look up a pinned key by id and algorithm.
    #[must_use]
    pub fn find(&self, key_id: &str, algo: &str) -> Option<&AllowlistedKey> {
        self.keys
            .iter()
            .find(|k| k.key_id == key_id && k.algo == algo)
    }
}

pub(crate) fn decode_hex(hex: &str, expect_len: usize) -> Result<Vec<u8>, KeyError> {
    if hex.len() != expect_len * 2 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(KeyError::MalformedHex(format!(
            "expected {} hex chars",
            expect_len * 2
        )));
    }
    let mut out = Vec::with_capacity(expect_len);
    let bytes = hex.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let s = std::str::from_utf8(pair).map_err(|e| KeyError::MalformedHex(e.to_string()))?;
        let b = u8::from_str_radix(s, 16).map_err(|e| KeyError::MalformedHex(e.to_string()))?;
        out.push(b);
    }
    Ok(out)
}

pub(crate) fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
