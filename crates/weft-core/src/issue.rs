// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation issues.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One validation finding.
///
/// Issues are ordered `(code, path, detail)` so issue lists are deterministic
/// regardless of validator internals.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Stable reason code, `[A-Z][A-Z0-9_]*`.
    pub code: String,
    /// JSON-pointer-ish locator of the offending field.
    pub path: String,
    /// Optional free-form detail (never secrets, never host state).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Issue {
    /// Build an issue with no detail.
    #[must_use]
    pub fn new(code: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            path: path.into(),
            detail: None,
        }
    }

    /// Build an issue with a detail string.
    #[must_use]
    pub fn with_detail(
        code: impl Into<String>,
        path: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            path: path.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Sort issues into their deterministic order and drop duplicates.
pub fn sort_issues(issues: &mut Vec<Issue>) {
    issues.sort();
    issues.dedup();
}

/// Collapse an issue list into a `Result`.
///
/// # Errors
///
/// Returns the sorted issue list when it is non-empty.
pub fn into_result<T>(value: T, mut issues: Vec<Issue>) -> Result<T, Vec<Issue>> {
    if issues.is_empty() {
        Ok(value)
    } else {
        sort_issues(&mut issues);
        Err(issues)
    }
}
