// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shape checks for loosely-typed payloads.
//!
//! Typed contract objects get their shape from serde (`deny_unknown_fields`);
//! these helpers cover the places where a `Value` crosses a boundary before
//! it has a type, such as evidence payloads and host adapters.

use weft_core::{Issue, codes, issue::into_result};
use serde_json::Value;

/// Check that an object carries only `allowed` keys and all of `required`.
///
/// # Errors
///
/// Returns `FIELD_INVALID` issues for unknown and missing keys, and for
/// non-object input.
pub fn check_object_shape(
    value: &Value,
    path: &str,
    allowed: &[&str],
    required: &[&str],
) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    match value {
        Value::Object(map) => {
            for key in map.keys() {
                if !allowed.contains(&key.as_str()) {
                    issues.push(Issue::with_detail(
                        codes::FIELD_INVALID,
                        format!("{path}.{key}"),
                        "unknown key",
                    ));
                }
            }
            for key in required {
                if !map.contains_key(*key) {
                    issues.push(Issue::with_detail(
                        codes::FIELD_INVALID,
                        format!("{path}.{key}"),
                        "missing key",
                    ));
                }
            }
        }
        _ => {
            issues.push(Issue::with_detail(codes::FIELD_INVALID, path, "not an object"));
        }
    }
    into_result((), issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exact_shape_passes() {
        let v = json!({"a": 1, "b": 2});
        check_object_shape(&v, "$", &["a", "b"], &["a"]).expect("valid");
    }

    #[test]
    fn unknown_key_fails() {
        let v = json!({"a": 1, "zz": 2});
        let issues = check_object_shape(&v, "$", &["a"], &[]).expect_err("unknown");
        assert_eq!(issues[0].path, "$.zz");
        assert_eq!(issues[0].code, codes::FIELD_INVALID);
    }

    #[test]
    fn missing_required_key_fails() {
        let v = json!({});
        let issues = check_object_shape(&v, "$", &["a"], &["a"]).expect_err("missing");
        assert_eq!(issues[0].detail.as_deref(), Some("missing key"));
    }

    #[test]
    fn non_object_fails() {
        let issues = check_object_shape(&json!(3), "$.x", &[], &[]).expect_err("scalar");
        assert_eq!(issues[0].path, "$.x");
    }
}
