// SPDX-License-Identifier: MIT OR Apache-2.0

//! Privacy scanning.
//!
//! No receipt, pulse, or portal model may carry credentials, absolute paths,
//! environment references, or wall-clock timestamps. The scan is purely
//! lexical and deterministic; it never consults the host.

use weft_core::{Issue, codes, issue::into_result};
use serde_json::Value;

/// Key names that must never appear in a receipt-bound object.
pub const FORBIDDEN_KEYS: &[&str] = &[
    "authorization",
    "cookie",
    "cvv",
    "password",
    "secret",
    "token",
];

/// Scan a JSON tree for forbidden keys and value patterns.
///
/// # Errors
///
/// Returns `PRIVACY_FORBIDDEN_KEY` / `PRIVACY_FORBIDDEN_VALUE` issues in
/// deterministic order.
pub fn check_privacy(value: &Value) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    walk(value, "$", &mut issues);
    into_result((), issues)
}

fn walk(value: &Value, path: &str, issues: &mut Vec<Issue>) {
    match value {
        Value::String(s) => {
            if let Some(pattern) = forbidden_value_pattern(s) {
                issues.push(Issue::with_detail(
                    codes::PRIVACY_FORBIDDEN_VALUE,
                    path,
                    pattern,
                ));
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &format!("{path}[{i}]"), issues);
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                let lower = key.to_ascii_lowercase();
                if FORBIDDEN_KEYS.contains(&lower.as_str()) {
                    issues.push(Issue::with_detail(
                        codes::PRIVACY_FORBIDDEN_KEY,
                        format!("{path}.{key}"),
                        lower,
                    ));
                }
                walk(val, &format!("{path}.{key}"), issues);
            }
        }
        _ => {}
    }
}

/// Classify a string as a forbidden value, returning the pattern name.
fn forbidden_value_pattern(s: &str) -> Option<String> {
    if is_absolute_path(s) {
        return Some("absolute path".to_string());
    }
    if has_env_reference(s) {
        return Some("environment reference".to_string());
    }
    if has_wall_clock_timestamp(s) {
        return Some("wall-clock timestamp".to_string());
    }
    None
}

fn is_absolute_path(s: &str) -> bool {
    if s.starts_with('/') && s.len() > 1 {
        return true;
    }
    if s.starts_with("\\\\") {
        return true;
    }
    // Drive-letter paths: "C:\..." or "C:/...".
    let bytes = s.as_bytes();
    bytes.len() > 2
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

fn has_env_reference(s: &str) -> bool {
    if s.contains("${") {
        return true;
    }
    // "%VAR%" style: a pair of percent signs wrapping an identifier.
    let mut chars = s.char_indices().filter(|(_, c)| *c == '%');
    if let (Some((start, _)), Some((end, _))) = (chars.next(), chars.next()) {
        let inner = &s[start + 1..end];
        return !inner.is_empty()
            && inner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
    }
    false
}

fn has_wall_clock_timestamp(s: &str) -> bool {
    // ISO-8601 date-time: "DDDD-DD-DDT" somewhere in the string.
    let bytes = s.as_bytes();
    if bytes.len() < 11 {
        return false;
    }
    bytes.windows(11).any(|w| {
        w[0].is_ascii_digit()
            && w[1].is_ascii_digit()
            && w[2].is_ascii_digit()
            && w[3].is_ascii_digit()
            && w[4] == b'-'
            && w[5].is_ascii_digit()
            && w[6].is_ascii_digit()
            && w[7] == b'-'
            && w[8].is_ascii_digit()
            && w[9].is_ascii_digit()
            && w[10] == b'T'
    })
}
