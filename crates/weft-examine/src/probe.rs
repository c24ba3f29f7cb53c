// SPDX-License-Identifier: MIT OR Apache-2.0

//! Probes.
//!
//! A probe drives the artifact's declared capability requests into a
//! deny-by-default kernel and records every attempt with its verdict.
//! Nothing here touches timers, randomness, or the host: the probe kernel is
//! frozen to the artifact's digest and a fixed probe session.

use crate::ExamineBounds;
use crate::capture::Capture;
use serde::{Deserialize, Serialize};
use weft_core::receipt::{CapAttempt, ProbeKind, ProbeOutcome, ProbeResult};
use weft_core::{ArtifactKind, ExecutionMode, Issue, codes, issue::into_result};
use weft_kernel::{InvokeMsg, Kernel, KernelContext};
use weft_loader::RealmBuilder;

/// The capability vocabulary a probe kernel knows.
pub const PROBE_KNOWN_CAPS: &[&str] = &[
    "fs.read",
    "fs.write",
    "id.sign",
    "net.fetch",
    "proc.spawn",
    "secret.read",
];

/// A bounded deterministic interaction script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InteractionScript {
    /// Capability attempts, replayed in order.
    pub steps: Vec<ScriptStep>,
}

/// One scripted capability attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScriptStep {
    /// The capability to attempt.
    pub cap_id: String,
}

/// Build the deny-all probe kernel for an artifact.
fn probe_kernel(artifact_digest: &str) -> Kernel {
    let ctx = KernelContext::new(
        artifact_digest,
        "probe-block",
        ExecutionMode::Strict,
        "probe-session",
    )
    .with_known_caps(PROBE_KNOWN_CAPS.iter().copied());
    let mut kernel = Kernel::new(ctx);
    // The probe realm is the strict profile; its self-test gates the kernel
    // exactly as a real load would.
    kernel.record_selftest(RealmBuilder::strict().build().self_test().is_ok());
    kernel
}

fn drive(kernel: &mut Kernel, prefix: &str, cap_ids: &[String]) -> Vec<CapAttempt> {
    let mut attempts = Vec::new();
    for (i, cap_id) in cap_ids.iter().enumerate() {
        let msg = InvokeMsg::for_context(kernel.context(), format!("{prefix}-{i:03}"), cap_id);
        let outcome = kernel.invoke(&msg);
        attempts.push(CapAttempt {
            cap_id: cap_id.clone(),
            allowed: outcome.ok,
            reason_codes: outcome.reason_codes,
        });
    }
    attempts
}

/// The declared capability requests of an artifact, read from the bundle's
/// plan when the capture carries one. Non-release artifacts declare nothing.
#[must_use]
pub fn declared_caps(capture: &Capture) -> Vec<String> {
    let Some(text) = capture.texts.get("runtime_bundle.json") else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return Vec::new();
    };
    let mut caps: Vec<String> = value
        .get("plan")
        .and_then(|plan| plan.get("grants"))
        .and_then(|grants| grants.as_array())
        .map(|grants| {
            grants
                .iter()
                .filter_map(|g| g.get("capId"))
                .filter_map(|id| id.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    weft_canon::sort::sort_unique_strings(&mut caps);
    caps
}

/// The load-only probe: instantiate the declared entry under strict
/// deny-all defaults and record every attempted capability.
#[must_use]
pub fn run_load_only(capture: &Capture, kind: ArtifactKind) -> ProbeResult {
    if kind.is_native_binary() {
        return ProbeResult {
            kind: ProbeKind::LoadOnly,
            outcome: ProbeOutcome::Withheld,
            attempted: vec![],
            reason_codes: vec![codes::EXECUTION_WITHHELD_UNSUPPORTED_ARTIFACT.to_string()],
        };
    }
    let declared = declared_caps(capture);
    if declared.is_empty() {
        return ProbeResult {
            kind: ProbeKind::LoadOnly,
            outcome: ProbeOutcome::NotApplicable,
            attempted: vec![],
            reason_codes: vec![],
        };
    }
    let mut kernel = probe_kernel(&capture.artifact_digest);
    let attempted = drive(&mut kernel, "load", &declared);
    ProbeResult {
        kind: ProbeKind::LoadOnly,
        outcome: ProbeOutcome::Completed,
        attempted,
        reason_codes: vec![],
    }
}

/// The optional interaction probe: replay a bounded script.
///
/// # Errors
///
/// Returns `HOST_INPUT_OVERSIZE` when the script exceeds its step or byte
/// bounds.
pub fn run_interaction_script(
    capture: &Capture,
    script: &InteractionScript,
    bounds: &ExamineBounds,
) -> Result<ProbeResult, Vec<Issue>> {
    let mut issues = Vec::new();
    if script.steps.len() as u64 > bounds.max_script_steps {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$.script.steps",
            format!("{} steps", script.steps.len()),
        ));
    }
    match weft_canon::canonical_json(script) {
        Ok(canonical) => {
            if canonical.len() as u64 > bounds.max_script_bytes {
                issues.push(Issue::with_detail(
                    codes::HOST_INPUT_OVERSIZE,
                    "$.script",
                    format!("{} bytes", canonical.len()),
                ));
            }
        }
        Err(e) => issues.push(Issue::with_detail(
            codes::CYCLE_IN_CANONICAL,
            "$.script",
            e.to_string(),
        )),
    }
    into_result((), issues)?;

    let cap_ids: Vec<String> = script.steps.iter().map(|s| s.cap_id.clone()).collect();
    let mut kernel = probe_kernel(&capture.artifact_digest);
    let attempted = drive(&mut kernel, "step", &cap_ids);
    Ok(ProbeResult {
        kind: ProbeKind::InteractionScript,
        outcome: ProbeOutcome::Completed,
        attempted,
        reason_codes: vec![],
    })
}
