// SPDX-License-Identifier: MIT OR Apache-2.0

//! Size and count bounds.
//!
//! Bounds are hard caps. Exceeding any one of them is a deterministic
//! `HOST_INPUT_OVERSIZE`, never a truncate-and-continue.

use weft_core::{Issue, codes, issue::into_result};
use serde_json::Value;

/// Caps applied to any receipt-bound JSON tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Maximum UTF-8 byte length of any single string.
    pub max_string_bytes: usize,
    /// Maximum element count of any single array.
    pub max_array_len: usize,
    /// Maximum total canonical byte size of the whole tree.
    pub max_total_bytes: usize,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            max_string_bytes: 4096,
            max_array_len: 4096,
            max_total_bytes: 1_048_576,
        }
    }
}

/// Walk a JSON tree and report every bound violation.
///
/// # Errors
///
/// Returns `HOST_INPUT_OVERSIZE` issues in deterministic order.
pub fn check_bounds(value: &Value, bounds: &Bounds) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    let mut total = 0usize;
    walk(value, "$", bounds, &mut issues, &mut total);
    if total > bounds.max_total_bytes {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$",
            format!("total {total} bytes"),
        ));
    }
    into_result((), issues)
}

fn walk(
    value: &Value,
    path: &str,
    bounds: &Bounds,
    issues: &mut Vec<Issue>,
    total: &mut usize,
) {
    match value {
        Value::String(s) => {
            *total += s.len();
            if s.len() > bounds.max_string_bytes {
                issues.push(Issue::with_detail(
                    codes::HOST_INPUT_OVERSIZE,
                    path,
                    format!("string {} bytes", s.len()),
                ));
            }
        }
        Value::Array(items) => {
            if items.len() > bounds.max_array_len {
                issues.push(Issue::with_detail(
                    codes::HOST_INPUT_OVERSIZE,
                    path,
                    format!("array {} items", items.len()),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}[{i}]"), bounds, issues, total);
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                *total += key.len();
                walk(val, &format!("{path}.{key}"), bounds, issues, total);
            }
        }
        Value::Number(_) => *total += 8,
        Value::Bool(_) | Value::Null => *total += 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn small_trees_pass() {
        check_bounds(&json!({"a": [1, 2, 3], "b": "ok"}), &Bounds::default()).expect("valid");
    }

    #[test]
    fn long_string_fails_at_its_path() {
        let bounds = Bounds {
            max_string_bytes: 4,
            ..Bounds::default()
        };
        let issues =
            check_bounds(&json!({"name": "toolong"}), &bounds).expect_err("oversize");
        assert_eq!(issues[0].code, codes::HOST_INPUT_OVERSIZE);
        assert_eq!(issues[0].path, "$.name");
    }

    #[test]
    fn long_array_fails() {
        let bounds = Bounds {
            max_array_len: 2,
            ..Bounds::default()
        };
        assert!(check_bounds(&json!([1, 2, 3]), &bounds).is_err());
    }

    #[test]
    fn total_cap_fires_on_aggregate() {
        let bounds = Bounds {
            max_string_bytes: 100,
            max_array_len: 100,
            max_total_bytes: 20,
        };
        let issues = check_bounds(&json!({"a": "0123456789", "b": "0123456789"}), &bounds)
            .expect_err("aggregate");
        assert!(issues.iter().any(|i| i.path == "$"));
    }
}
