// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-kernel
//!
//! The capability kernel: the only door between executing code and the
//! outside world. A kernel is frozen at load time to one plan, one caller,
//! one mode, and one session; every invocation runs the full check ladder,
//! collecting ALL reasons before the verdict, so reordering the checks can
//! never change the outcome set. No reasons means allow; anything else is a
//! deny with a stable, sorted reason list and one telemetry event.

/// Consent claims and per-session consent bookkeeping.
pub mod consent;
/// The async message door.
pub mod door;
/// Denial telemetry.
pub mod telemetry;

pub use consent::{ConsentClaim, ConsentSubject, ConsentTracker};
pub use door::KernelDoor;
pub use telemetry::{DenyEvent, TelemetryCollector};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use weft_core::{ExecutionMode, GateReceipt, GateDecision, ReleaseStatus, ShopStamp, Tier, codes};
use weft_release::{CryptoPort, KeyAllowlist, PublicKey};

/// Capabilities that require a consent claim per invocation.
pub const CONSENT_REQUIRED_CAPS: &[&str] = &["id.sign"];

/// Market admission context, present when the plan runs inside a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketContext {
    /// The admitting market.
    pub market_id: String,
    /// Digest of the market's policy.
    pub market_policy_digest: String,
    /// The gate expected to have admitted this plan, when pinned.
    pub gate_id: Option<String>,
    /// The release the market admitted.
    pub release_id: String,
}

/// The frozen per-load kernel context.
#[derive(Clone)]
pub struct KernelContext {
    /// Plan the kernel enforces.
    pub plan_digest: String,
    /// The one block allowed to call.
    pub caller_block_hash: String,
    /// Frozen execution mode.
    pub execution_mode: ExecutionMode,
    /// Session nonce every message must echo.
    pub session_nonce: String,
    /// Granted capability ids.
    pub granted_caps: BTreeSet<String>,
    /// Known capability ids.
    pub known_caps: BTreeSet<String>,
    /// Administratively disabled capability ids.
    pub disabled_caps: BTreeSet<String>,
    /// Tier floor demanded by the runtime.
    pub runtime_tier: Option<Tier>,
    /// Tier asserted for the caller block.
    pub block_tier: Option<Tier>,
    /// Shop stamp observed for the caller block.
    pub shop_stamp: Option<ShopStamp>,
    /// Crypto port for stamp signature checks.
    pub crypto_port: Option<Arc<dyn CryptoPort>>,
    /// Pinned keys for stamp signature checks.
    pub key_allowlist: KeyAllowlist,
    /// Outcome of release verification at load time.
    pub release_status: ReleaseStatus,
    /// Reasons behind a non-OK release status.
    pub release_reason_codes: Vec<String>,
    /// Capabilities gated on a verified release.
    pub release_gated_caps: BTreeSet<String>,
    /// Capabilities that require the secret zone.
    pub secret_required_caps: BTreeSet<String>,
    /// Whether the secret zone is available this session.
    pub secret_zone_available: bool,
    /// Market admission context, if any.
    pub market: Option<MarketContext>,
    /// The admission receipt presented for the market.
    pub admission_receipt: Option<GateReceipt>,
    /// Capabilities eligible in the admitting market.
    pub eligible_caps_by_market: BTreeSet<String>,
    /// Consent claim presented for consent-gated capabilities.
    pub consent_claim: Option<ConsentClaim>,
}

impl std::fmt::Debug for KernelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelContext")
            .field("plan_digest", &self.plan_digest)
            .field("caller_block_hash", &self.caller_block_hash)
            .field("execution_mode", &self.execution_mode)
            .field("granted_caps", &self.granted_caps)
            .field("release_status", &self.release_status)
            .finish_non_exhaustive()
    }
}

impl KernelContext {
    /// A minimal context: deny-by-default, no grants, no market, strict mode.
    #[must_use]
    pub fn new(
        plan_digest: impl Into<String>,
        caller_block_hash: impl Into<String>,
        execution_mode: ExecutionMode,
        session_nonce: impl Into<String>,
    ) -> Self {
        Self {
            plan_digest: plan_digest.into(),
            caller_block_hash: caller_block_hash.into(),
            execution_mode,
            session_nonce: session_nonce.into(),
            granted_caps: BTreeSet::new(),
            known_caps: BTreeSet::new(),
            disabled_caps: BTreeSet::new(),
            runtime_tier: None,
            block_tier: None,
            shop_stamp: None,
            crypto_port: None,
            key_allowlist: KeyAllowlist::default(),
            release_status: ReleaseStatus::Ok,
            release_reason_codes: Vec::new(),
            release_gated_caps: BTreeSet::new(),
            secret_required_caps: BTreeSet::new(),
            secret_zone_available: false,
            market: None,
            admission_receipt: None,
            eligible_caps_by_market: BTreeSet::new(),
            consent_claim: None,
        }
    }

    /// Set the known capability set.
    #[must_use]
    pub fn with_known_caps<I: IntoIterator<Item = S>, S: Into<String>>(mut self, caps: I) -> Self {
        self.known_caps = caps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the granted capability set.
    #[must_use]
    pub fn with_granted_caps<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        caps: I,
    ) -> Self {
        self.granted_caps = caps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the release gate inputs.
    #[must_use]
    pub fn with_release_gate<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        status: ReleaseStatus,
        reason_codes: Vec<String>,
        gated_caps: I,
    ) -> Self {
        self.release_status = status;
        self.release_reason_codes = reason_codes;
        self.release_gated_caps = gated_caps.into_iter().map(Into::into).collect();
        self
    }
}

/// A capability invocation message. The realm sends exactly this shape
/// through the door; there is no other I/O path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvokeMsg {
    /// Request id, unique per session.
    pub req_id: String,
    /// The capability being invoked.
    pub cap_id: String,
    /// Echo of the execution mode.
    pub execution_mode: ExecutionMode,
    /// Echo of the plan digest.
    pub plan_digest: String,
    /// Echo of the session nonce.
    pub session_nonce: String,
    /// Echo of the caller block hash.
    pub caller_block_hash: String,
}

impl InvokeMsg {
    /// Build a message that echoes a context's bindings.
    #[must_use]
    pub fn for_context(ctx: &KernelContext, req_id: impl Into<String>, cap_id: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
            cap_id: cap_id.into(),
            execution_mode: ctx.execution_mode,
            plan_digest: ctx.plan_digest.clone(),
            session_nonce: ctx.session_nonce.clone(),
            caller_block_hash: ctx.caller_block_hash.clone(),
        }
    }
}

/// The kernel's answer to one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InvokeOutcome {
    /// `true` exactly when no check produced a reason.
    pub ok: bool,
    /// Executor result on allow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Sorted unique reasons on deny; empty on allow.
    pub reason_codes: Vec<String>,
}

/// Executes an allowed capability. Implementations must be deterministic.
pub trait CapExecutor: Send {
    /// Produce the capability's result value.
    fn execute(&self, msg: &InvokeMsg) -> Value;
}

impl<F> CapExecutor for F
where
    F: Fn(&InvokeMsg) -> Value + Send,
{
    fn execute(&self, msg: &InvokeMsg) -> Value {
        self(msg)
    }
}

/// The capability kernel. One instance per load, internally single-threaded.
pub struct Kernel {
    ctx: KernelContext,
    seen_req_ids: BTreeSet<String>,
    selftest_passed: bool,
    consent: ConsentTracker,
    telemetry: TelemetryCollector,
    executors: BTreeMap<String, Box<dyn CapExecutor>>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("ctx", &self.ctx)
            .field("seen_req_ids", &self.seen_req_ids.len())
            .field("selftest_passed", &self.selftest_passed)
            .finish_non_exhaustive()
    }
}

impl Kernel {
    /// Instantiate a kernel over a frozen context.
    #[must_use]
    pub fn new(ctx: KernelContext) -> Self {
        Self {
            ctx,
            seen_req_ids: BTreeSet::new(),
            selftest_passed: false,
            consent: ConsentTracker::new(),
            telemetry: TelemetryCollector::new(),
            executors: BTreeMap::new(),
        }
    }

    /// The frozen context.
    #[must_use]
    pub fn context(&self) -> &KernelContext {
        &self.ctx
    }

    /// Record the realm self-test outcome.
    pub fn record_selftest(&mut self, passed: bool) {
        self.selftest_passed = passed;
    }

    /// Install a deterministic executor for an allowed capability.
    pub fn install_executor(&mut self, cap_id: impl Into<String>, executor: Box<dyn CapExecutor>) {
        self.executors.insert(cap_id.into(), executor);
    }

    /// Denial events recorded so far.
    #[must_use]
    pub fn deny_events(&self) -> &[DenyEvent] {
        self.telemetry.events()
    }

    /// Evaluate one invocation.
    ///
    /// Runs the whole check ladder, collecting every reason, then returns
    /// the verdict. Denials emit exactly one `cap.deny` telemetry event.
    pub fn invoke(&mut self, msg: &InvokeMsg) -> InvokeOutcome {
        let mut reasons: Vec<String> = Vec::new();

        // Observed stamp, precomputed for the tier check.
        let stamp_tier = self.observed_stamp_tier();
        if self.ctx.shop_stamp.is_some() && stamp_tier.is_none() {
            reasons.push(codes::STAMP_INVALID.to_string());
        }

        // Binding checks: mode, plan, nonce, caller.
        if msg.execution_mode != self.ctx.execution_mode {
            reasons.push(codes::MODE_MISMATCH.to_string());
        }
        if msg.plan_digest != self.ctx.plan_digest {
            reasons.push(codes::PLANDIGEST_MISMATCH.to_string());
        }
        if msg.session_nonce != self.ctx.session_nonce {
            reasons.push(codes::NONCE_MISMATCH.to_string());
        }
        if msg.caller_block_hash != self.ctx.caller_block_hash {
            reasons.push(codes::CALLER_MISMATCH.to_string());
        }

        // Strict mode needs a passing self-test first.
        if self.ctx.execution_mode == ExecutionMode::Strict && !self.selftest_passed {
            reasons.push(codes::SELFTEST_REQUIRED.to_string());
        }

        // Replay detection; first sight is recorded either way.
        if !self.seen_req_ids.insert(msg.req_id.clone()) {
            reasons.push(codes::REPLAY_DETECTED.to_string());
        }

        // Tier floor. A valid stamp supplies the block tier.
        let effective_block_tier = stamp_tier.or(self.ctx.block_tier);
        if let (Some(runtime), Some(block)) = (self.ctx.runtime_tier, effective_block_tier)
            && block < runtime
        {
            reasons.push(codes::TIER_VIOLATION.to_string());
        }

        // Capability knowledge and grant.
        if !self.ctx.known_caps.contains(&msg.cap_id) {
            reasons.push(codes::CAP_UNKNOWN.to_string());
        }
        if !self.ctx.granted_caps.contains(&msg.cap_id) {
            reasons.push(codes::CAP_NOT_GRANTED.to_string());
        }

        // Market gate.
        if self.ctx.market.is_some() {
            reasons.extend(self.market_gate_reasons(&msg.cap_id));
        }

        // Release gate.
        if self.ctx.release_status != ReleaseStatus::Ok
            && self.ctx.release_gated_caps.contains(&msg.cap_id)
        {
            if self.ctx.release_reason_codes.is_empty() {
                reasons.push(codes::RELEASE_UNVERIFIED.to_string());
            } else {
                reasons.extend(self.ctx.release_reason_codes.iter().cloned());
            }
        }

        // Secret zone.
        if self.ctx.secret_required_caps.contains(&msg.cap_id)
            && !self.ctx.secret_zone_available
        {
            reasons.push(codes::SECRET_ZONE_REQUIRED.to_string());
            reasons.push(codes::SECRET_ZONE_UNAVAILABLE.to_string());
        }

        // Consent.
        if CONSENT_REQUIRED_CAPS.contains(&msg.cap_id.as_str()) {
            let claim = self.ctx.consent_claim.clone();
            reasons.extend(self.consent.check_and_record(
                claim.as_ref(),
                &msg.cap_id,
                &self.ctx.plan_digest,
                &self.ctx.caller_block_hash,
            ));
        }

        // Disabled list.
        if self.ctx.disabled_caps.contains(&msg.cap_id) {
            reasons.push(codes::CAP_DISABLED_V0.to_string());
        }

        if reasons.is_empty() {
            let value = self
                .executors
                .get(&msg.cap_id)
                .map_or(Value::Null, |executor| executor.execute(msg));
            return InvokeOutcome {
                ok: true,
                value: Some(value),
                reason_codes: Vec::new(),
            };
        }

        let reason_codes = weft_canon::sort::sorted_reason_codes(reasons);
        self.telemetry.record_deny(
            &self.ctx.plan_digest,
            &self.ctx.caller_block_hash,
            &msg.cap_id,
            reason_codes.clone(),
        );
        InvokeOutcome {
            ok: false,
            value: None,
            reason_codes,
        }
    }

    /// Validate the observed stamp: digest law, signature against the
    /// pinned keys, caller binding, accept decision, and the runtime tier
    /// floor. Returns the stamped tier when all of it holds.
    fn observed_stamp_tier(&self) -> Option<Tier> {
        let stamp = self.ctx.shop_stamp.as_ref()?;
        if stamp.verify_digest().is_err() {
            return None;
        }
        if stamp.block_hash != self.ctx.caller_block_hash {
            return None;
        }
        if stamp.accept_decision != weft_core::AcceptDecision::Accept {
            return None;
        }
        if let Some(runtime) = self.ctx.runtime_tier
            && stamp.tier < runtime
        {
            return None;
        }
        let port = self.ctx.crypto_port.as_deref()?;
        let signature = stamp.signature.as_deref()?;
        let message = {
            let unsigned = ShopStamp {
                stamp_digest: None,
                signature: None,
                ..stamp.clone()
            };
            weft_canon::canonical_json(&unsigned).ok()?
        };
        let verified = self.ctx.key_allowlist.keys.iter().any(|key| {
            key.algo == "ed25519"
                && PublicKey::from_hex(&key.public_key_hex)
                    .is_ok_and(|k| port.verify(&k, message.as_bytes(), signature))
        });
        verified.then_some(stamp.tier)
    }

    fn market_gate_reasons(&self, cap_id: &str) -> Vec<String> {
        let market = self
            .ctx
            .market
            .as_ref()
            .expect("market gate runs only with a market context");
        let mut reasons = Vec::new();

        match &self.ctx.admission_receipt {
            None => reasons.push(codes::RECEIPT_MISSING.to_string()),
            Some(receipt) => {
                if receipt.verify_id().is_err() {
                    reasons.push(codes::RECEIPT_INVALID.to_string());
                } else {
                    let gate_matches = market
                        .gate_id
                        .as_deref()
                        .is_none_or(|gate| gate == receipt.gate_id);
                    let subject_matches = gate_matches
                        && receipt.market_id == market.market_id
                        && receipt.market_policy_digest == market.market_policy_digest
                        && receipt.plan_digest == self.ctx.plan_digest
                        && receipt.release_id == market.release_id
                        && receipt.block_hash == self.ctx.caller_block_hash;
                    if !subject_matches {
                        reasons.push(codes::RECEIPT_SUBJECT_MISMATCH.to_string());
                    } else if receipt.decision != GateDecision::Allow {
                        reasons.push(codes::RECEIPT_DENY.to_string());
                    }
                }
            }
        }

        if !self.ctx.eligible_caps_by_market.contains(cap_id) {
            reasons.push(codes::CAP_NOT_ELIGIBLE_MARKET.to_string());
        }
        reasons
    }
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn strict_ctx() -> KernelContext {
        KernelContext::new("plan-1", "block-1", ExecutionMode::Strict, "nonce-1")
            .with_known_caps(["net.fetch", "fs.read", "id.sign"])
    }

    fn ready_kernel(ctx: KernelContext) -> Kernel {
        let mut kernel = Kernel::new(ctx);
        kernel.record_selftest(true);
        kernel
    }

    fn msg(kernel: &Kernel, req_id: &str, cap_id: &str) -> InvokeMsg {
        InvokeMsg::for_context(kernel.context(), req_id, cap_id)
    }

    #[test]
    fn ungranted_cap_denies_with_exactly_one_reason() {
        let mut kernel = ready_kernel(strict_ctx());
        let m = msg(&kernel, "r1", "net.fetch");
        let outcome = kernel.invoke(&m);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason_codes, vec![codes::CAP_NOT_GRANTED]);
        assert_eq!(kernel.deny_events().len(), 1);
        assert_eq!(kernel.deny_events()[0].cap_id, "net.fetch");
    }

    #[test]
    fn granted_cap_allows_and_runs_the_executor() {
        let mut kernel = ready_kernel(strict_ctx().with_granted_caps(["fs.read"]));
        kernel.install_executor(
            "fs.read",
            Box::new(|_: &InvokeMsg| serde_json::json!({"bytes": 7})),
        );
        let m = msg(&kernel, "r1", "fs.read");
        let outcome = kernel.invoke(&m);
        assert!(outcome.ok);
        assert_eq!(outcome.value, Some(serde_json::json!({"bytes": 7})));
        assert!(outcome.reason_codes.is_empty());
        assert!(kernel.deny_events().is_empty());
    }

    #[test]
    fn plan_binding_mismatch_is_reported() {
        let mut kernel = ready_kernel(strict_ctx().with_granted_caps(["fs.read"]));
        let mut m = msg(&kernel, "r1", "fs.read");
        m.plan_digest = "plan-bad".to_string();
        let outcome = kernel.invoke(&m);
        assert!(outcome.reason_codes.contains(&codes::PLANDIGEST_MISMATCH.to_string()));
    }

    #[test]
    fn replayed_req_id_is_detected() {
        let mut kernel = ready_kernel(strict_ctx().with_granted_caps(["fs.read"]));
        let m = msg(&kernel, "dup", "fs.read");
        assert!(kernel.invoke(&m).ok);
        let outcome = kernel.invoke(&m);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason_codes, vec![codes::REPLAY_DETECTED]);
    }

    #[test]
    fn denied_request_still_burns_its_req_id() {
        let mut kernel = ready_kernel(strict_ctx());
        let m = msg(&kernel, "r1", "net.fetch");
        assert!(!kernel.invoke(&m).ok);
        let outcome = kernel.invoke(&m);
        assert!(outcome.reason_codes.contains(&codes::REPLAY_DETECTED.to_string()));
    }

    #[test]
    fn strict_mode_without_selftest_denies_everything() {
        let mut kernel = Kernel::new(strict_ctx().with_granted_caps(["fs.read"]));
        let m = msg(&kernel, "r1", "fs.read");
        let outcome = kernel.invoke(&m);
        assert_eq!(outcome.reason_codes, vec![codes::SELFTEST_REQUIRED]);
    }

    #[test]
    fn compatible_mode_needs_no_selftest() {
        let ctx = KernelContext::new("plan-1", "block-1", ExecutionMode::Compatible, "nonce-1")
            .with_known_caps(["fs.read"])
            .with_granted_caps(["fs.read"]);
        let mut kernel = Kernel::new(ctx);
        let m = msg(&kernel, "r1", "fs.read");
        assert!(kernel.invoke(&m).ok);
    }

    #[test]
    fn all_reasons_are_collected_not_short_circuited() {
        let mut kernel = Kernel::new(strict_ctx());
        let m = InvokeMsg {
            req_id: "r1".to_string(),
            cap_id: "cap.never.heard.of".to_string(),
            execution_mode: ExecutionMode::Legacy,
            plan_digest: "plan-bad".to_string(),
            session_nonce: "nonce-bad".to_string(),
            caller_block_hash: "block-bad".to_string(),
        };
        let outcome = kernel.invoke(&m);
        let expected = weft_canon::sort::sorted_reason_codes([
            codes::MODE_MISMATCH,
            codes::PLANDIGEST_MISMATCH,
            codes::NONCE_MISMATCH,
            codes::CALLER_MISMATCH,
            codes::SELFTEST_REQUIRED,
            codes::CAP_UNKNOWN,
            codes::CAP_NOT_GRANTED,
        ]);
        assert_eq!(outcome.reason_codes, expected);
    }

    #[test]
    fn unknown_and_ungranted_stack() {
        let mut kernel = ready_kernel(strict_ctx());
        let m = msg(&kernel, "r1", "cap.unheard");
        let outcome = kernel.invoke(&m);
        assert_eq!(
            outcome.reason_codes,
            vec![codes::CAP_NOT_GRANTED, codes::CAP_UNKNOWN]
        );
    }

    #[test]
    fn tier_violation_fires_when_both_tiers_set() {
        let mut ctx = strict_ctx().with_granted_caps(["fs.read"]);
        ctx.runtime_tier = Some(Tier::T2);
        ctx.block_tier = Some(Tier::T1);
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "fs.read");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::TIER_VIOLATION]
        );
    }

    #[test]
    fn tier_check_is_skipped_when_a_tier_is_absent() {
        let mut ctx = strict_ctx().with_granted_caps(["fs.read"]);
        ctx.runtime_tier = Some(Tier::T2);
        ctx.block_tier = None;
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "fs.read");
        assert!(kernel.invoke(&m).ok);
    }

    #[test]
    fn disabled_cap_is_reported_even_when_granted() {
        let mut ctx = strict_ctx().with_granted_caps(["fs.read"]);
        ctx.disabled_caps = ["fs.read".to_string()].into_iter().collect();
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "fs.read");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::CAP_DISABLED_V0]
        );
    }

    #[test]
    fn release_gate_appends_release_reasons() {
        let ctx = strict_ctx()
            .with_granted_caps(["net.fetch"])
            .with_release_gate(
                ReleaseStatus::Unverified,
                vec![codes::RELEASE_SIGNATURE_BAD.to_string()],
                ["net.fetch"],
            );
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::RELEASE_SIGNATURE_BAD]
        );
    }

    #[test]
    fn release_gate_defaults_to_release_unverified() {
        let ctx = strict_ctx()
            .with_granted_caps(["net.fetch"])
            .with_release_gate(ReleaseStatus::Maybe, vec![], ["net.fetch"]);
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::RELEASE_UNVERIFIED]
        );
    }

    #[test]
    fn ungated_caps_ignore_release_status() {
        let ctx = strict_ctx()
            .with_granted_caps(["fs.read"])
            .with_release_gate(ReleaseStatus::Unverified, vec![], ["net.fetch"]);
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "fs.read");
        assert!(kernel.invoke(&m).ok);
    }

    #[test]
    fn secret_zone_gate_reports_both_codes() {
        let mut ctx = strict_ctx().with_granted_caps(["fs.read"]);
        ctx.secret_required_caps = ["fs.read".to_string()].into_iter().collect();
        ctx.secret_zone_available = false;
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "fs.read");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::SECRET_ZONE_REQUIRED, codes::SECRET_ZONE_UNAVAILABLE]
        );
    }

    #[test]
    fn consent_gate_requires_a_claim_for_id_sign() {
        let mut kernel = ready_kernel(strict_ctx().with_granted_caps(["id.sign"]));
        let m = msg(&kernel, "r1", "id.sign");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::CONSENT_MISSING]
        );
    }

    #[test]
    fn valid_consent_allows_once_then_replays() {
        let mut ctx = strict_ctx().with_granted_caps(["id.sign"]);
        ctx.consent_claim = Some(ConsentClaim {
            consent_id: "c1".to_string(),
            action: "id.sign".to_string(),
            subject: ConsentSubject {
                plan_digest: "plan-1".to_string(),
                block_hash: "block-1".to_string(),
            },
            issuer_id: "operator-1".to_string(),
            seq: 1,
        });
        let mut kernel = ready_kernel(ctx);
        let first = msg(&kernel, "r1", "id.sign");
        assert!(kernel.invoke(&first).ok);
        let second = msg(&kernel, "r2", "id.sign");
        assert_eq!(
            kernel.invoke(&second).reason_codes,
            vec![codes::CONSENT_REPLAY]
        );
    }

    #[test]
    fn market_gate_demands_an_admission_receipt() {
        let mut ctx = strict_ctx().with_granted_caps(["net.fetch"]);
        ctx.market = Some(MarketContext {
            market_id: "market-1".to_string(),
            market_policy_digest: "sha256:market-policy".to_string(),
            gate_id: None,
            release_id: "sha256:release".to_string(),
        });
        ctx.eligible_caps_by_market = ["net.fetch".to_string()].into_iter().collect();
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::RECEIPT_MISSING]
        );
    }

    #[test]
    fn market_gate_passes_with_a_sound_allow_receipt() {
        let mut ctx = strict_ctx().with_granted_caps(["net.fetch"]);
        ctx.market = Some(MarketContext {
            market_id: "market-1".to_string(),
            market_policy_digest: "sha256:market-policy".to_string(),
            gate_id: Some("gate-1".to_string()),
            release_id: "sha256:release".to_string(),
        });
        ctx.eligible_caps_by_market = ["net.fetch".to_string()].into_iter().collect();
        ctx.admission_receipt = Some(
            GateReceipt {
                gate_id: "gate-1".to_string(),
                market_id: "market-1".to_string(),
                market_policy_digest: "sha256:market-policy".to_string(),
                plan_digest: "plan-1".to_string(),
                release_id: "sha256:release".to_string(),
                block_hash: "block-1".to_string(),
                decision: GateDecision::Allow,
                reason_codes: vec![],
                checkpoint_digest: "sha256:checkpoint".to_string(),
                receipt_id: None,
            }
            .with_id()
            .expect("mint"),
        );
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "net.fetch");
        assert!(kernel.invoke(&m).ok);
    }

    #[test]
    fn market_gate_rejects_subject_mismatch_and_deny_receipts() {
        let base_receipt = GateReceipt {
            gate_id: "gate-1".to_string(),
            market_id: "market-1".to_string(),
            market_policy_digest: "sha256:market-policy".to_string(),
            plan_digest: "plan-1".to_string(),
            release_id: "sha256:release".to_string(),
            block_hash: "block-1".to_string(),
            decision: GateDecision::Allow,
            reason_codes: vec![],
            checkpoint_digest: "sha256:checkpoint".to_string(),
            receipt_id: None,
        };

        // Wrong market on the receipt.
        let mut wrong_subject = base_receipt.clone();
        wrong_subject.market_id = "market-other".to_string();
        let mut ctx = strict_ctx().with_granted_caps(["net.fetch"]);
        ctx.market = Some(MarketContext {
            market_id: "market-1".to_string(),
            market_policy_digest: "sha256:market-policy".to_string(),
            gate_id: None,
            release_id: "sha256:release".to_string(),
        });
        ctx.eligible_caps_by_market = ["net.fetch".to_string()].into_iter().collect();
        ctx.admission_receipt = Some(wrong_subject.with_id().expect("mint"));
        let mut kernel = ready_kernel(ctx.clone());
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::RECEIPT_SUBJECT_MISMATCH]
        );

        // Deny decision on an otherwise matching receipt.
        let mut denying = base_receipt.clone();
        denying.decision = GateDecision::Deny;
        ctx.admission_receipt = Some(denying.with_id().expect("mint"));
        let mut kernel = ready_kernel(ctx.clone());
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(kernel.invoke(&m).reason_codes, vec![codes::RECEIPT_DENY]);

        // Tampered receipt id.
        let mut forged = base_receipt.with_id().expect("mint");
        forged.decision = GateDecision::Deny;
        ctx.admission_receipt = Some(forged);
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::RECEIPT_INVALID]
        );
    }

    #[test]
    fn market_eligibility_is_checked_per_cap() {
        let mut ctx = strict_ctx().with_granted_caps(["net.fetch"]);
        ctx.market = Some(MarketContext {
            market_id: "market-1".to_string(),
            market_policy_digest: "sha256:market-policy".to_string(),
            gate_id: None,
            release_id: "sha256:release".to_string(),
        });
        // Receipt is fine, but the cap is not market-eligible.
        ctx.admission_receipt = Some(
            GateReceipt {
                gate_id: "gate-1".to_string(),
                market_id: "market-1".to_string(),
                market_policy_digest: "sha256:market-policy".to_string(),
                plan_digest: "plan-1".to_string(),
                release_id: "sha256:release".to_string(),
                block_hash: "block-1".to_string(),
                decision: GateDecision::Allow,
                reason_codes: vec![],
                checkpoint_digest: "sha256:checkpoint".to_string(),
                receipt_id: None,
            }
            .with_id()
            .expect("mint"),
        );
        let mut kernel = ready_kernel(ctx);
        let m = msg(&kernel, "r1", "net.fetch");
        assert_eq!(
            kernel.invoke(&m).reason_codes,
            vec![codes::CAP_NOT_ELIGIBLE_MARKET]
        );
    }

    #[test]
    fn deny_outcome_is_independent_of_request_order() {
        let build = || ready_kernel(strict_ctx());
        let mut a = build();
        let mut b = build();
        let m1 = InvokeMsg::for_context(a.context(), "r1", "net.fetch");
        let m2 = InvokeMsg::for_context(a.context(), "r2", "fs.read");
        let out_a = (a.invoke(&m1), a.invoke(&m2));
        let out_b = {
            let second = b.invoke(&m2);
            let first = b.invoke(&m1);
            (first, second)
        };
        assert_eq!(out_a.0.reason_codes, out_b.0.reason_codes);
        assert_eq!(out_a.1.reason_codes, out_b.1.reason_codes);
    }
}
