// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-canon
//!
//! The frozen serialization every WeftEnd digest is computed over.
//!
//! Canonical rules:
//! - mapping keys are emitted in strict lexicographic (code-point) order;
//! - strings (keys and values) are NFC-normalized UTF-8;
//! - ordered sequences preserve order;
//! - `null` and missing collapse to `null`; non-finite numbers collapse to
//!   `null` before they reach the writer;
//! - no whitespace anywhere in the output.
//!
//! Two digest families share the codec: SHA-256 (`sha256:` prefix) for trust
//! digests and FNV-1a 32-bit (`fnv1a32:` prefix) for cheap fingerprints.
//! Hashing input is exactly the canonical byte sequence.

/// Stable-sort helpers shared by every producer of sorted sets.
pub mod sort;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::is_nfc;

/// Nesting depth at which the writer refuses to continue.
///
/// `serde_json::Value` is a tree, so a genuine cycle cannot reach the writer;
/// exceeding this depth means the producing structure was cyclic or
/// pathological, and the writer fails closed.
pub const MAX_CANONICAL_DEPTH: usize = 128;

/// Algorithm prefix carried by every SHA-256 digest string.
pub const SHA256_PREFIX: &str = "sha256:";

/// Algorithm prefix carried by every FNV-1a 32-bit fingerprint string.
pub const FNV1A32_PREFIX: &str = "fnv1a32:";

const FNV1A32_OFFSET: u32 = 0x811c_9dc5;
const FNV1A32_PRIME: u32 = 0x0100_0193;

/// Errors from canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonError {
    /// Nesting exceeded [`MAX_CANONICAL_DEPTH`]; the producer is cyclic.
    #[error("CYCLE_IN_CANONICAL: nesting exceeds {MAX_CANONICAL_DEPTH} levels")]
    Cycle,
    /// The value could not be converted to a JSON tree.
    #[error("canonical conversion failed: {0}")]
    Convert(String),
}

/// Serialize a JSON tree to its canonical byte-stable string form.
///
/// # Errors
///
/// Returns [`CanonError::Cycle`] if nesting exceeds [`MAX_CANONICAL_DEPTH`].
pub fn canonical_string(value: &Value) -> Result<String, CanonError> {
    let mut out = String::new();
    write_value(&mut out, value, 0)?;
    Ok(out)
}

/// Convert any serializable value into the JSON tree the writer consumes.
///
/// Non-finite numbers become `Value::Null` during conversion, which is how
/// the `NaN`/`Infinity` → `null` collapse is enforced.
///
/// # Errors
///
/// Returns [`CanonError::Convert`] if the value cannot be represented as JSON.
pub fn canonical_value<T: Serialize>(value: &T) -> Result<Value, CanonError> {
    serde_json::to_value(value).map_err(|e| CanonError::Convert(e.to_string()))
}

/// Produce the canonical string of any serializable value.
///
/// # Errors
///
/// Propagates conversion and depth failures.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CanonError> {
    canonical_string(&canonical_value(value)?)
}

/// Compute the prefixed SHA-256 digest of a byte sequence.
#[must_use]
pub fn sha256_digest(bytes: &[u8]) -> String {
    format!("{SHA256_PREFIX}{:x}", Sha256::digest(bytes))
}

/// Compute the prefixed FNV-1a 32-bit fingerprint of a byte sequence.
#[must_use]
pub fn fnv1a32_fingerprint(bytes: &[u8]) -> String {
    let mut hash = FNV1A32_OFFSET;
    for b in bytes {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(FNV1A32_PRIME);
    }
    format!("{FNV1A32_PREFIX}{hash:08x}")
}

/// SHA-256 digest of a value's canonical bytes.
///
/// # Errors
///
/// Propagates canonicalization failures.
pub fn digest_value<T: Serialize>(value: &T) -> Result<String, CanonError> {
    Ok(sha256_digest(canonical_json(value)?.as_bytes()))
}

/// FNV-1a 32-bit fingerprint of a value's canonical bytes.
///
/// # Errors
///
/// Propagates canonicalization failures.
pub fn fingerprint_value<T: Serialize>(value: &T) -> Result<String, CanonError> {
    Ok(fnv1a32_fingerprint(canonical_json(value)?.as_bytes()))
}

/// Returns `true` if `s` carries a recognized digest-family prefix.
#[must_use]
pub fn has_digest_prefix(s: &str) -> bool {
    s.starts_with(SHA256_PREFIX) || s.starts_with(FNV1A32_PREFIX)
}

fn write_value(out: &mut String, value: &Value, depth: usize) -> Result<(), CanonError> {
    if depth > MAX_CANONICAL_DEPTH {
        return Err(CanonError::Cycle);
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item, depth + 1)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, &Value)> =
                map.iter().map(|(k, v)| (nfc(k), v)).collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            out.push('{');
            for (i, (key, val)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, val, depth + 1)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn nfc(s: &str) -> String {
    if is_nfc(s) {
        s.to_owned()
    } else {
        s.nfc().collect()
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in nfc(s).chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
