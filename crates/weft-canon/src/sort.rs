// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stable-sort helpers.
//!
//! Every sorted set in a receipt goes through one of these helpers so the
//! ordering discipline lives in exactly one place.

use crate::CanonError;
use serde::{Deserialize, Serialize};

/// Sort a reason-code list in place and drop duplicates.
pub fn sort_reason_codes(codes: &mut Vec<String>) {
    codes.sort();
    codes.dedup();
}

/// Return a sorted, de-duplicated copy of a reason-code iterator.
#[must_use]
pub fn sorted_reason_codes<I, S>(codes: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = codes.into_iter().map(Into::into).collect();
    sort_reason_codes(&mut out);
    out
}

/// A structured reason with its deterministic sort key.
///
/// Boundary arrays carry plain codes; internally a reason may bind a subject
/// (e.g. an evidence kind) and a locator (e.g. a path).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReasonEntry {
    /// The reason code, `[A-Z][A-Z0-9_]*`.
    pub code: String,
    /// Optional bound subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Optional locator within the subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl ReasonEntry {
    /// A bare reason with no subject or locator.
    #[must_use]
    pub fn bare(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            subject: None,
            locator: None,
        }
    }

    /// A reason bound to a subject.
    #[must_use]
    pub fn with_subject(code: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            subject: Some(subject.into()),
            locator: None,
        }
    }
}

/// Sort reason entries by `(code, subject, locator)` and drop duplicates.
pub fn sort_reason_entries(entries: &mut Vec<ReasonEntry>) {
    entries.sort();
    entries.dedup();
}

/// Sort items by a caller-computed string key, keeping the sort stable.
pub fn sort_by_key_string<T>(items: &mut [T], key: impl Fn(&T) -> String) {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
}

/// Sort items by a canonical-JSON-derived key.
///
/// Used wherever a set is ordered by `canonical(params)`: the key closure
/// canonicalizes the relevant fields and the sort compares the bytes.
///
/// # Errors
///
/// Propagates the first canonicalization failure.
pub fn sort_by_canonical_key<T>(
    items: &mut Vec<T>,
    key: impl Fn(&T) -> Result<String, CanonError>,
) -> Result<(), CanonError> {
    let mut keyed: Vec<(String, T)> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        keyed.push((key(&item)?, item));
    }
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
    Ok(())
}

/// Sort and de-duplicate a string set in place.
pub fn sort_unique_strings(items: &mut Vec<String>) {
    items.sort();
    items.dedup();
}
