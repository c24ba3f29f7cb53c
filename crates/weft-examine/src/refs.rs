// SPDX-License-Identifier: MIT OR Apache-2.0

//! External reference extraction.
//!
//! Scans the text entries of a capture for http/https references. The result
//! set is bounded, sorted, and de-duplicated; blowing the bound fails closed.

use weft_core::{Issue, codes, issue::into_result};

const SCHEMES: &[&str] = &["http://", "https://"];

/// Characters that end a reference.
fn is_ref_end(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | '<' | '>' | ')' | ']' | '}' | '`')
}

/// Extract the sorted unique external references from text entries.
///
/// # Errors
///
/// Returns `HOST_INPUT_OVERSIZE` when the unique set exceeds `max_refs`.
pub fn extract_external_refs<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    max_refs: usize,
) -> Result<Vec<String>, Vec<Issue>> {
    let mut refs: Vec<String> = Vec::new();
    for text in texts {
        for scheme in SCHEMES {
            let mut rest = text;
            while let Some(at) = rest.find(scheme) {
                let tail = &rest[at..];
                let end = tail.find(is_ref_end).unwrap_or(tail.len());
                let candidate = tail[..end].trim_end_matches(['.', ',', ';']);
                if candidate.len() > scheme.len() {
                    refs.push(candidate.to_string());
                }
                rest = &rest[at + scheme.len()..];
            }
        }
    }
    weft_canon::sort::sort_unique_strings(&mut refs);

    let mut issues = Vec::new();
    if refs.len() > max_refs {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$.externalRefs",
            format!("{} refs", refs.len()),
        ));
    }
    into_result(refs, issues)
}
