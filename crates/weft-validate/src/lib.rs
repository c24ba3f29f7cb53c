// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-validate
//!
//! Pure validators over the WeftEnd contract. Every entry point returns
//! `Result<(), Vec<Issue>>` with issues in their deterministic
//! `(code, path, detail)` order, and every check fails closed: anything the
//! validator cannot positively accept is an issue.

/// Digest-binding checks.
pub mod binding;
/// Size and count bounds.
pub mod bounds;
/// Privacy scanning.
pub mod privacy;
/// Shape checks.
pub mod shape;

pub use binding::{validate_evidence_binding, validate_mint_binding, validate_release_binding};
pub use bounds::{Bounds, check_bounds};
pub use privacy::check_privacy;
pub use shape::check_object_shape;

use weft_core::{Issue, MintReceipt, codes, issue::into_result};

/// Validate a reason-code list: grammar, sortedness, uniqueness.
///
/// # Errors
///
/// Returns the sorted issue list on any violation.
pub fn check_reason_codes(reason_codes: &[String], path: &str) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();
    for (i, code) in reason_codes.iter().enumerate() {
        if !weft_core::reason::is_valid_reason_code(code) {
            issues.push(Issue::with_detail(
                codes::REASON_CODE_INVALID,
                format!("{path}[{i}]"),
                code.clone(),
            ));
        }
    }
    let sorted = reason_codes.windows(2).all(|w| w[0] < w[1]);
    if !sorted {
        issues.push(Issue::new(codes::REASON_CODES_UNSORTED, path));
    }
    into_result((), issues)
}

/// Validate a mint receipt: schema tag, reason codes, privacy, bounds, and
/// the mint digest binding.
///
/// # Errors
///
/// Returns the sorted issue list on any violation.
pub fn validate_mint_receipt(receipt: &MintReceipt, bounds: &Bounds) -> Result<(), Vec<Issue>> {
    let mut issues = Vec::new();

    if receipt.schema != MintReceipt::SCHEMA_V1 {
        issues.push(Issue::with_detail(
            codes::MINT_INVALID,
            "$.schema",
            receipt.schema.clone(),
        ));
    }

    if let Err(more) = check_reason_codes(&receipt.reason_codes, "$.reasonCodes") {
        issues.extend(more);
    }

    let refs_sorted = receipt.external_refs.windows(2).all(|w| w[0] < w[1]);
    if !refs_sorted {
        issues.push(Issue::new(codes::MINT_INVALID, "$.externalRefs"));
    }

    match weft_canon::canonical_value(receipt) {
        Ok(tree) => {
            if let Err(more) = check_privacy(&tree) {
                issues.extend(more);
            }
            if let Err(more) = check_bounds(&tree, bounds) {
                issues.extend(more);
            }
        }
        Err(e) => {
            issues.push(Issue::with_detail(
                codes::MINT_INVALID,
                "$",
                e.to_string(),
            ));
        }
    }

    if let Err(more) = validate_mint_binding(receipt) {
        issues.extend(more);
    }

    if !issues.is_empty() {
        tracing::debug!(count = issues.len(), "mint receipt failed validation");
    }
    into_result((), issues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_unique_codes_pass() {
        let codes_list = vec!["A_ONE".to_string(), "B_TWO".to_string()];
        check_reason_codes(&codes_list, "$.reasonCodes").expect("valid");
    }

    #[test]
    fn unsorted_codes_fail() {
        let codes_list = vec!["B_TWO".to_string(), "A_ONE".to_string()];
        let issues = check_reason_codes(&codes_list, "$.reasonCodes").expect_err("unsorted");
        assert!(issues.iter().any(|i| i.code == codes::REASON_CODES_UNSORTED));
    }

    #[test]
    fn duplicate_codes_fail() {
        let codes_list = vec!["A_ONE".to_string(), "A_ONE".to_string()];
        assert!(check_reason_codes(&codes_list, "$.reasonCodes").is_err());
    }

    #[test]
    fn bad_grammar_reports_the_offender() {
        let codes_list = vec!["bad_code".to_string()];
        let issues = check_reason_codes(&codes_list, "$.reasonCodes").expect_err("invalid");
        assert_eq!(issues[0].code, codes::REASON_CODE_INVALID);
        assert_eq!(issues[0].detail.as_deref(), Some("bad_code"));
    }
}
