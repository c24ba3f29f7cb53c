// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capture trees.
//!
//! A capture tree is the bounded, ordered inventory of an artifact's files.
//! Format parsers (ZIP, tar, OCI, EML) and the directory walker both emit
//! this shape, and everything downstream consumes it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use weft_canon::CanonError;

/// One file (or directory) inside a capture tree.
///
/// Paths are relative, forward-slash separated, and NFC-normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureEntry {
    /// Relative forward-slash path.
    pub path: String,
    /// Lowercased kind label derived from the entry ("js", "exe", "dir", ...).
    pub kind: String,
    /// Size in bytes, already clamped to the capture bounds.
    pub size_bounded: u64,
    /// SHA-256 digest of the entry's bytes (`sha256:` prefixed); empty for
    /// directories.
    pub content_digest: String,
}

/// The ordered, bounded inventory of an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CaptureTree {
    /// Entries sorted by `path`.
    pub entries: Vec<CaptureEntry>,
    /// Total bounded bytes across all entries.
    pub total_bytes: u64,
    /// `true` when any bound clipped the capture.
    pub truncated: bool,
}

impl CaptureTree {
    /// Build a tree from entries, enforcing the sort invariant.
    #[must_use]
    pub fn new(mut entries: Vec<CaptureEntry>, truncated: bool) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let total_bytes = entries.iter().map(|e| e.size_bounded).sum();
        Self {
            entries,
            total_bytes,
            truncated,
        }
    }

    /// Returns `true` if entries are sorted by path with no duplicates.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].path < w[1].path)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the tree holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SHA-256 digest of the canonical tree; this is the `captureDigest`
    /// carried by mint receipts.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn capture_digest(&self) -> Result<String, CanonError> {
        weft_canon::digest_value(self)
    }

    /// Per-kind entry counts in deterministic order.
    #[must_use]
    pub fn kind_counts(&self) -> std::collections::BTreeMap<String, u64> {
        let mut counts = std::collections::BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, kind: &str, size: u64) -> CaptureEntry {
        CaptureEntry {
            path: path.to_string(),
            kind: kind.to_string(),
            size_bounded: size,
            content_digest: weft_canon::sha256_digest(path.as_bytes()),
        }
    }

    #[test]
    fn new_sorts_entries_by_path() {
        let tree = CaptureTree::new(
            vec![entry("b.txt", "txt", 2), entry("a.txt", "txt", 1)],
            false,
        );
        assert!(tree.is_sorted());
        assert_eq!(tree.entries[0].path, "a.txt");
        assert_eq!(tree.total_bytes, 3);
    }

    #[test]
    fn capture_digest_is_stable_under_input_order() {
        let a = CaptureTree::new(
            vec![entry("x", "txt", 1), entry("y", "txt", 1)],
            false,
        );
        let b = CaptureTree::new(
            vec![entry("y", "txt", 1), entry("x", "txt", 1)],
            false,
        );
        assert_eq!(
            a.capture_digest().expect("digest"),
            b.capture_digest().expect("digest")
        );
    }

    #[test]
    fn kind_counts_are_deterministic() {
        let tree = CaptureTree::new(
            vec![
                entry("a.js", "js", 1),
                entry("b.js", "js", 1),
                entry("c.txt", "txt", 1),
            ],
            false,
        );
        let counts = tree.kind_counts();
        assert_eq!(counts.get("js"), Some(&2));
        assert_eq!(counts.get("txt"), Some(&1));
    }

    #[test]
    fn truncation_marker_survives_roundtrip() {
        let tree = CaptureTree::new(vec![entry("a", "txt", 1)], true);
        let json = serde_json::to_string(&tree).expect("serialize");
        let back: CaptureTree = serde_json::from_str(&json).expect("parse");
        assert!(back.truncated);
        assert_eq!(back, tree);
    }
}
