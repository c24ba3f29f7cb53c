// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-verify360
//!
//! The verify-360 gate: a linear state machine with monotonic transitions
//! over injected phase outcomes. Every run writes a full staged triple
//! under `history/run_<seq>/`, failed and replayed runs included; only a
//! fresh, passing run advances `latest.txt`, and it does so atomically.
//! Receipts chain to their predecessor by file digest.

use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use weft_core::{ContractError, GateDecision};

/// File names of the staged triple.
pub const RECEIPT_FILE: &str = "verify_360_receipt.json";
/// Human report file name.
pub const REPORT_FILE: &str = "verify_360_report.txt";
/// Output manifest file name.
pub const OUTPUT_MANIFEST_FILE: &str = "verify_360_output_manifest.json";
/// The pointer file.
pub const LATEST_FILE: &str = "latest.txt";

/// The gate's states, in transition order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateState {
    /// Nothing has run.
    Init,
    /// Context prechecks passed.
    Prechecked,
    /// The compile phase passed.
    CompileDone,
    /// The test phase passed.
    TestDone,
    /// The proof-check phase passed.
    ProofcheckDone,
    /// The determinism phase passed.
    DeterminismDone,
    /// The staged triple is on disk.
    Staged,
    /// The pointer switch committed.
    Finalized,
    /// The run is part of history.
    Recorded,
}

impl GateState {
    /// The wire name, used in fail-closed reason codes.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Prechecked => "PRECHECKED",
            Self::CompileDone => "COMPILE_DONE",
            Self::TestDone => "TEST_DONE",
            Self::ProofcheckDone => "PROOFCHECK_DONE",
            Self::DeterminismDone => "DETERMINISM_DONE",
            Self::Staged => "STAGED",
            Self::Finalized => "FINALIZED",
            Self::Recorded => "RECORDED",
        }
    }

    /// The fail-closed reason code for a failure at this state.
    #[must_use]
    pub fn fail_closed_code(self) -> String {
        format!("VERIFY360_FAIL_CLOSED_AT_{}", self.wire_name())
    }
}

/// The canonical gate context; its digest is the run key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GateContext {
    /// The gate identity.
    pub gate_id: String,
    /// Digest of the subject under verification.
    pub subject_digest: String,
    /// Plan binding, when the subject carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_digest: Option<String>,
    /// Policy binding, when the subject carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_digest: Option<String>,
    /// Deterministic input override (`WEFTEND_360_INPUT`), when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_override: Option<String>,
    /// Free-form deterministic parameters.
    pub params: BTreeMap<String, serde_json::Value>,
}

impl GateContext {
    /// The canonical run key.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn context_key(&self) -> Result<String, ContractError> {
        Ok(weft_canon::digest_value(self)?)
    }

    /// Apply the `WEFTEND_360_INPUT` override from the frozen config.
    #[must_use]
    pub fn with_env_input(mut self, config: &weft_core::EnvConfig) -> Self {
        self.input_override = config.input_360.clone();
        self
    }
}

/// Outcome of one injected phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// Whether the phase passed.
    pub ok: bool,
    /// Bounded detail line for the report.
    pub detail: Option<String>,
    /// Reason codes behind a failure.
    pub reason_codes: Vec<String>,
}

impl PhaseOutcome {
    /// A passing phase.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            ok: true,
            detail: None,
            reason_codes: vec![],
        }
    }

    /// A failing phase with one reason.
    #[must_use]
    pub fn fail(code: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: None,
            reason_codes: vec![code.into()],
        }
    }
}

/// The injected phase family. The gate never shells out; hosts supply the
/// compile/test/proof outcomes deterministically.
pub trait GatePhases {
    /// Validate the context before anything else runs.
    fn precheck(&self, ctx: &GateContext) -> PhaseOutcome;
    /// The compile phase.
    fn compile(&self, ctx: &GateContext) -> PhaseOutcome;
    /// The test phase.
    fn test(&self, ctx: &GateContext) -> PhaseOutcome;
    /// The proof-check phase.
    fn proofcheck(&self, ctx: &GateContext) -> PhaseOutcome;
    /// The determinism phase.
    fn determinism(&self, ctx: &GateContext) -> PhaseOutcome;
}

/// One phase's report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PhaseReport {
    /// The state the phase transitions into.
    pub phase: String,
    /// Whether it passed.
    pub ok: bool,
    /// Detail line, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Reason codes behind a failure.
    pub reason_codes: Vec<String>,
}

/// Replay marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum IdempotenceMode {
    /// First run for this context key.
    Fresh,
    /// A duplicate-key run.
    Replay,
}

/// What the run did to the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum PointerPolicy {
    /// `latest.txt` advanced.
    Advance,
    /// `latest.txt` was left alone.
    Suppress,
}

/// Idempotence facts on a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Idempotence {
    /// Fresh or replay.
    pub mode: IdempotenceMode,
    /// Advance or suppress.
    pub pointer_policy: PointerPolicy,
}

/// The chain link to the prior run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HistoryLink {
    /// The prior run's id.
    pub prior_run_id: String,
    /// SHA-256 of the prior run's receipt file bytes.
    pub prior_receipt_file_digest: String,
}

/// The verify-360 receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Verify360Receipt {
    /// The gate identity.
    pub gate_id: String,
    /// The canonical run key.
    pub context_key: String,
    /// This run's id.
    pub run_id: String,
    /// The state the run reached.
    pub state: GateState,
    /// The decision.
    pub decision: GateDecision,
    /// Per-phase reports in execution order.
    pub phases: Vec<PhaseReport>,
    /// Sorted unique reason codes.
    pub reason_codes: Vec<String>,
    /// Idempotence facts.
    pub idempotence: Idempotence,
    /// Link to the prior run, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_link: Option<HistoryLink>,
    /// Digest over the history link tuple.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_link_digest: Option<String>,
    /// Identity digest; `None` until sealed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_digest: Option<String>,
}

impl Verify360Receipt {
    /// Seal the receipt's identity digest.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn with_digest(mut self) -> Result<Self, ContractError> {
        self.receipt_digest =
            Some(weft_core::digest_with_field_nulled(&self, "receiptDigest")?);
        Ok(self)
    }
}

/// One entry of the output manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ManifestEntry {
    /// File name inside the run folder.
    pub path: String,
    /// SHA-256 of the file bytes.
    pub digest: String,
}

/// The output manifest of a staged run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputManifest {
    /// Entries sorted by path.
    pub files: Vec<ManifestEntry>,
}

/// What a gate run produced.
#[derive(Debug, Clone)]
pub struct GateRunRecord {
    /// The sealed receipt, as written.
    pub receipt: Verify360Receipt,
    /// The run folder.
    pub run_dir: PathBuf,
    /// Whether `latest.txt` advanced.
    pub pointer_advanced: bool,
}

/// The gate, rooted at a history directory.
#[derive(Debug)]
pub struct Verify360Gate {
    root: PathBuf,
}

impl Verify360Gate {
    /// Open (and create) a gate rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the history directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("history"))
            .with_context(|| format!("create gate history under {}", root.display()))?;
        Ok(Self { root })
    }

    /// The current `latest.txt` pointer, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the pointer exists but cannot be read.
    pub fn latest(&self) -> Result<Option<String>> {
        let path = self.root.join(LATEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(anyhow::Error::new(e).context(format!("read {}", path.display())))
            }
        }
    }

    /// Run the gate over a context with injected phases.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failures; phase failures produce a
    /// fail-closed receipt, not an error.
    pub fn run(&self, ctx: &GateContext, phases: &dyn GatePhases) -> Result<GateRunRecord> {
        let context_key = ctx.context_key().context("derive context key")?;
        let seq = self.next_seq()?;
        let run_id = format!("run_{seq:04}");
        let run_dir = self.root.join("history").join(&run_id);

        let replay = self.find_context_key(&context_key)?;
        let mode = if replay {
            IdempotenceMode::Replay
        } else {
            IdempotenceMode::Fresh
        };

        let history_link = self.link_to_prior()?;
        let history_link_digest = history_link
            .as_ref()
            .map(|link| weft_canon::digest_value(link))
            .transpose()
            .context("digest history link")?;

        // Walk the ladder. The first failing phase fail-closes at the state
        // it would have produced.
        let ladder: [(GateState, PhaseOutcome); 5] = [
            (GateState::Prechecked, phases.precheck(ctx)),
            (GateState::CompileDone, phases.compile(ctx)),
            (GateState::TestDone, phases.test(ctx)),
            (GateState::ProofcheckDone, phases.proofcheck(ctx)),
            (GateState::DeterminismDone, phases.determinism(ctx)),
        ];

        let mut reports = Vec::new();
        let mut reasons: Vec<String> = Vec::new();
        let mut state = GateState::Init;
        let mut failed = false;
        for (target, outcome) in ladder {
            reports.push(PhaseReport {
                phase: target.wire_name().to_string(),
                ok: outcome.ok,
                detail: outcome.detail.clone(),
                reason_codes: outcome.reason_codes.clone(),
            });
            if outcome.ok {
                state = target;
            } else {
                reasons.extend(outcome.reason_codes);
                reasons.push(target.fail_closed_code());
                failed = true;
                break;
            }
        }

        let decision = if failed {
            GateDecision::Deny
        } else {
            // Passing runs record; replays record without moving the pointer.
            state = GateState::Recorded;
            GateDecision::Allow
        };

        let pointer_policy =
            if decision == GateDecision::Allow && mode == IdempotenceMode::Fresh {
                PointerPolicy::Advance
            } else {
                PointerPolicy::Suppress
            };

        let receipt = Verify360Receipt {
            gate_id: ctx.gate_id.clone(),
            context_key,
            run_id: run_id.clone(),
            state,
            decision,
            phases: reports,
            reason_codes: weft_canon::sort::sorted_reason_codes(reasons),
            idempotence: Idempotence {
                mode,
                pointer_policy,
            },
            history_link,
            history_link_digest,
            receipt_digest: None,
        }
        .with_digest()
        .context("seal receipt")?;

        // Stage the triple.
        std::fs::create_dir_all(&run_dir)
            .with_context(|| format!("create run dir {}", run_dir.display()))?;
        let receipt_json =
            serde_json::to_string_pretty(&receipt).context("serialize receipt")?;
        std::fs::write(run_dir.join(RECEIPT_FILE), &receipt_json)
            .with_context(|| format!("write receipt into {}", run_dir.display()))?;
        let report_text = render_report(&receipt);
        std::fs::write(run_dir.join(REPORT_FILE), &report_text)
            .with_context(|| format!("write report into {}", run_dir.display()))?;
        let manifest = OutputManifest {
            files: vec![
                ManifestEntry {
                    path: RECEIPT_FILE.to_string(),
                    digest: weft_canon::sha256_digest(receipt_json.as_bytes()),
                },
                ManifestEntry {
                    path: REPORT_FILE.to_string(),
                    digest: weft_canon::sha256_digest(report_text.as_bytes()),
                },
            ],
        };
        std::fs::write(
            run_dir.join(OUTPUT_MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest).context("serialize manifest")?,
        )
        .with_context(|| format!("write manifest into {}", run_dir.display()))?;

        // Finalize: the pointer switch is atomic and only a fresh, passing
        // run commits it.
        let pointer_advanced = pointer_policy == PointerPolicy::Advance;
        if pointer_advanced {
            self.advance_pointer(&run_id)?;
        }

        tracing::info!(
            run = %run_id,
            ?decision,
            pointer_advanced,
            "verify-360 run complete"
        );
        Ok(GateRunRecord {
            receipt,
            run_dir,
            pointer_advanced,
        })
    }

    fn next_seq(&self) -> Result<u64> {
        let history = self.root.join("history");
        let mut max_seq = 0u64;
        for entry in std::fs::read_dir(&history)
            .with_context(|| format!("read history {}", history.display()))?
        {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str()
                && let Some(n) = name.strip_prefix("run_")
                && let Ok(seq) = n.parse::<u64>()
            {
                max_seq = max_seq.max(seq);
            }
        }
        Ok(max_seq + 1)
    }

    fn find_context_key(&self, context_key: &str) -> Result<bool> {
        let history = self.root.join("history");
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&history)
            .with_context(|| format!("read history {}", history.display()))?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        for dir in dirs {
            let path = dir.join(RECEIPT_FILE);
            let Ok(json) = std::fs::read_to_string(&path) else {
                continue;
            };
            if let Ok(receipt) = serde_json::from_str::<Verify360Receipt>(&json)
                && receipt.context_key == context_key
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn link_to_prior(&self) -> Result<Option<HistoryLink>> {
        let Some(prior_run_id) = self.latest()? else {
            return Ok(None);
        };
        let receipt_path = self
            .root
            .join("history")
            .join(&prior_run_id)
            .join(RECEIPT_FILE);
        let bytes = std::fs::read(&receipt_path)
            .with_context(|| format!("read prior receipt {}", receipt_path.display()))?;
        Ok(Some(HistoryLink {
            prior_run_id,
            prior_receipt_file_digest: weft_canon::sha256_digest(&bytes),
        }))
    }

    fn advance_pointer(&self, run_id: &str) -> Result<()> {
        let path = self.root.join(LATEST_FILE);
        let tmp = path.with_extension("tmp");
        {
            use std::io::Write as _;
            let mut file = std::fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            writeln!(file, "{run_id}").with_context(|| format!("write {}", tmp.display()))?;
            file.sync_all().with_context(|| format!("fsync {}", tmp.display()))?;
        }
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("rename pointer into {}", path.display()))?;
        Ok(())
    }
}

fn render_report(receipt: &Verify360Receipt) -> String {
    let mut out = String::new();
    out.push_str(&format!("gate: {}\n", receipt.gate_id));
    out.push_str(&format!("run: {}\n", receipt.run_id));
    out.push_str(&format!("state: {}\n", receipt.state.wire_name()));
    out.push_str(&format!("decision: {:?}\n", receipt.decision));
    out.push_str("phases:\n");
    for phase in &receipt.phases {
        let mark = if phase.ok { "pass" } else { "FAIL" };
        out.push_str(&format!("  {} {}\n", phase.phase, mark));
    }
    if receipt.reason_codes.is_empty() {
        out.push_str("reasons: none\n");
    } else {
        out.push_str("reasons:\n");
        for code in &receipt.reason_codes {
            out.push_str(&format!("  {code}\n"));
        }
    }
    out
}
