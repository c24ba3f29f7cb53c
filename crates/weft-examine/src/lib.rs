// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-examine
//!
//! The safe-run pipeline: capture → classify → observe → probe → mint.
//! Everything is pure and synchronous; two runs over the same input produce
//! byte-identical receipts. Bounds are hard caps and every violation fails
//! closed with a stable code.

/// Capture of bytes, directories, and parser trees.
pub mod capture;
/// Artifact classification.
pub mod classify;
/// Minting and grading.
pub mod mint;
/// Deny-all probes.
pub mod probe;
/// External reference extraction.
pub mod refs;

pub use capture::{ArtifactInput, Capture};
pub use classify::classify;
pub use mint::{build_mint, grade_of};
pub use probe::{InteractionScript, ScriptStep, declared_caps, run_interaction_script, run_load_only};
pub use refs::extract_external_refs;

use serde_json::Value;
use weft_core::receipt::SafeRunReceipt;
use weft_core::{Issue, codes};
use weft_validate::Bounds;

/// Hard caps of the examiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamineBounds {
    /// Maximum file count per capture.
    pub max_files: u64,
    /// Maximum total bytes per capture.
    pub max_total_bytes: u64,
    /// Maximum bytes per file.
    pub max_file_bytes: u64,
    /// Maximum unique external references.
    pub max_external_refs: usize,
    /// Maximum canonical bytes of an interaction script.
    pub max_script_bytes: u64,
    /// Maximum steps of an interaction script.
    pub max_script_steps: u64,
}

impl Default for ExamineBounds {
    fn default() -> Self {
        Self {
            max_files: 2048,
            max_total_bytes: 64 * 1024 * 1024,
            max_file_bytes: 16 * 1024 * 1024,
            max_external_refs: 256,
            max_script_bytes: 64 * 1024,
            max_script_steps: 256,
        }
    }
}

/// One safe-run request.
pub struct SafeRunRequest {
    /// The artifact.
    pub input: ArtifactInput,
    /// Hard caps.
    pub bounds: ExamineBounds,
    /// Digest of the policy in force, copied into the receipt.
    pub policy_digest: Option<String>,
    /// Host truth captured by an external adapter, compared opaquely.
    pub host_truth: Option<Value>,
    /// Optional deterministic interaction script.
    pub interaction_script: Option<InteractionScript>,
}

impl SafeRunRequest {
    /// A request with default bounds and no optional inputs.
    #[must_use]
    pub fn new(input: ArtifactInput) -> Self {
        Self {
            input,
            bounds: ExamineBounds::default(),
            policy_digest: None,
            host_truth: None,
            interaction_script: None,
        }
    }
}

/// Run the full pipeline and mint the receipt.
///
/// # Errors
///
/// Returns sorted issues when a bound is exceeded or the minted receipt
/// fails its own validation.
pub fn safe_run(request: &SafeRunRequest) -> Result<SafeRunReceipt, Vec<Issue>> {
    let capture = capture::capture(&request.input, &request.bounds)?;
    let kind = classify::classify(&capture);
    tracing::debug!(?kind, name = %capture.name, "artifact classified");

    let external_refs = refs::extract_external_refs(
        capture.texts.values().map(String::as_str),
        request.bounds.max_external_refs,
    )?;

    let mut probes = vec![probe::run_load_only(&capture, kind)];
    if let Some(script) = &request.interaction_script {
        probes.push(probe::run_interaction_script(
            &capture,
            script,
            &request.bounds,
        )?);
    }

    let mint = mint::build_mint(&capture, kind, external_refs, probes)
        .map_err(|e| vec![Issue::with_detail(codes::MINT_INVALID, "$", e.to_string())])?;
    weft_validate::validate_mint_receipt(&mint, &Bounds::default())?;

    Ok(SafeRunReceipt {
        mint,
        policy_digest: request.policy_digest.clone(),
        host_truth: request.host_truth.clone(),
    })
}
