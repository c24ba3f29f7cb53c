// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! weft-library
//!
//! The per-target run library. Each target owns `runs/<runId>/` folders of
//! immutable receipts and one `view/view_state.json` that is only ever
//! replaced atomically. Run ids derive from content, baseline acceptance is
//! an explicit operator action, and repeated analysis of the same input
//! reports `SAME` byte for byte.

/// The bucketed compare algorithm.
pub mod compare;

pub use compare::{compare_runs, verdict_for};

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use weft_core::receipt::{OperatorReceipt, ReportCard, SafeRunReceipt};
use weft_core::view::{RunKey, ViewState};
use weft_core::{Bucket, CompareVerdict, UserFailure};

/// Bound on sanitized target keys.
pub const MAX_TARGET_KEY_LEN: usize = 64;

/// File names inside a run folder.
pub const SAFE_RUN_RECEIPT_FILE: &str = "safe_run_receipt.json";
/// Operator receipt file name.
pub const OPERATOR_RECEIPT_FILE: &str = "operator_receipt.json";
/// Human report card file name.
pub const REPORT_CARD_TEXT_FILE: &str = "report_card.txt";
/// Machine report card file name.
pub const REPORT_CARD_JSON_FILE: &str = "report_card_v0.json";
/// Wrapper result file name, written by the host wrapper next to a run.
pub const WRAPPER_RESULT_FILE: &str = "wrapper_result.txt";

/// Sanitize a target filename into a bounded key.
#[must_use]
pub fn sanitize_target(filename: &str) -> String {
    let mut key: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    key.truncate(MAX_TARGET_KEY_LEN);
    if key.is_empty() {
        key.push('_');
    }
    key
}

/// What recording a run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    /// The run's folder id.
    pub run_id: String,
    /// Verdict against the baseline, when one exists.
    pub verdict: Option<CompareVerdict>,
    /// Buckets that fired against the baseline.
    pub buckets: BTreeSet<Bucket>,
}

/// The library root.
#[derive(Debug)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    /// Open (and create) a library rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the root cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create library root {}", root.display()))?;
        Ok(Self { root })
    }

    fn target_dir(&self, target_key: &str) -> PathBuf {
        self.root.join(target_key)
    }

    fn view_path(&self, target_key: &str) -> PathBuf {
        self.target_dir(target_key).join("view").join("view_state.json")
    }

    /// Record a safe run for a target. Returns the run id and the verdict
    /// against the current baseline, and updates the view atomically.
    ///
    /// # Errors
    ///
    /// Returns an error when receipts cannot be written or the view cannot
    /// be replaced.
    pub fn record_run(
        &self,
        target_filename: &str,
        receipt: &SafeRunReceipt,
    ) -> Result<RecordedRun> {
        let target_key = sanitize_target(target_filename);
        let mut view = self.view(&target_key)?;

        let run_id = self.place_run(&target_key, receipt)?;

        let (verdict, buckets) = match view.baseline_run_id.as_deref() {
            None => (None, BTreeSet::new()),
            Some(baseline_id) if baseline_id == run_id => {
                (Some(CompareVerdict::Same), BTreeSet::new())
            }
            Some(baseline_id) => {
                let baseline = self.load_run(&target_key, baseline_id)?;
                let buckets = compare_runs(&baseline, receipt);
                (Some(verdict_for(&buckets, view.is_frozen())), buckets)
            }
        };

        self.write_operator_outputs(&target_key, &run_id, receipt, verdict, &buckets)?;

        view.push_run(RunKey {
            run_id: run_id.clone(),
            verdict_vs_baseline: verdict.unwrap_or(CompareVerdict::Same),
            buckets: buckets.clone(),
        });
        self.replace_view(&target_key, &view)?;

        tracing::info!(target = %target_key, run = %run_id, ?verdict, "run recorded");
        Ok(RecordedRun {
            run_id,
            verdict,
            buckets,
        })
    }

    /// Accept a recorded run as the baseline. Explicit and operator-visible;
    /// nothing in the library ever does this implicitly.
    ///
    /// # Errors
    ///
    /// Returns an error when the run does not exist or the view cannot be
    /// replaced.
    pub fn accept_baseline(&self, target_filename: &str, run_id: &str) -> Result<()> {
        let target_key = sanitize_target(target_filename);
        let run_dir = self.target_dir(&target_key).join("runs").join(run_id);
        anyhow::ensure!(run_dir.is_dir(), "run {run_id} does not exist");
        let mut view = self.view(&target_key)?;
        view.baseline_run_id = Some(run_id.to_string());
        view.blocked = Some(false);
        self.replace_view(&target_key, &view)?;
        tracing::info!(target = %target_key, run = %run_id, "baseline accepted");
        Ok(())
    }

    /// Freeze the baseline: further changes report `BLOCKED` until the
    /// operator accepts again.
    ///
    /// # Errors
    ///
    /// Returns an error when the view cannot be replaced.
    pub fn freeze_baseline(&self, target_filename: &str) -> Result<()> {
        let target_key = sanitize_target(target_filename);
        let mut view = self.view(&target_key)?;
        view.blocked = Some(true);
        self.replace_view(&target_key, &view)
    }

    /// The current view for a target; a default view when none exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error when an existing view cannot be read or parsed.
    pub fn view(&self, target_key: &str) -> Result<ViewState> {
        let path = self.view_path(target_key);
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .with_context(|| format!("parse view state {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ViewState::default()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("read view state {}", path.display()))),
        }
    }

    /// Load a stored run receipt.
    ///
    /// # Errors
    ///
    /// Returns an error when the receipt cannot be read or parsed.
    pub fn load_run(&self, target_key: &str, run_id: &str) -> Result<SafeRunReceipt> {
        let path = self
            .target_dir(target_key)
            .join("runs")
            .join(run_id)
            .join(SAFE_RUN_RECEIPT_FILE);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("read run receipt {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parse {}", path.display()))
    }

    /// Place a run folder: content-derived id, idempotent for identical
    /// content, `_NNN`-suffixed on fingerprint collision.
    fn place_run(&self, target_key: &str, receipt: &SafeRunReceipt) -> Result<String> {
        let fingerprint = receipt
            .run_fingerprint()
            .context("fingerprint run receipt")?;
        let hex = fingerprint
            .rsplit(':')
            .next()
            .unwrap_or(fingerprint.as_str());
        let base_id = format!("run_{hex}");
        let runs_dir = self.target_dir(target_key).join("runs");
        let receipt_json =
            serde_json::to_string_pretty(receipt).context("serialize run receipt")?;

        let mut candidate = base_id.clone();
        for suffix in 1..1000 {
            let dir = runs_dir.join(&candidate);
            let receipt_path = dir.join(SAFE_RUN_RECEIPT_FILE);
            if !dir.exists() {
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("create run dir {}", dir.display()))?;
                std::fs::write(&receipt_path, &receipt_json)
                    .with_context(|| format!("write {}", receipt_path.display()))?;
                return Ok(candidate);
            }
            let existing = std::fs::read_to_string(&receipt_path).unwrap_or_default();
            if existing == receipt_json {
                // Identical content: the run is already recorded.
                return Ok(candidate);
            }
            candidate = format!("{base_id}_{suffix:03}");
        }
        anyhow::bail!("run id space exhausted for {base_id}")
    }

    fn write_operator_outputs(
        &self,
        target_key: &str,
        run_id: &str,
        receipt: &SafeRunReceipt,
        verdict: Option<CompareVerdict>,
        buckets: &BTreeSet<Bucket>,
    ) -> Result<()> {
        let dir = self.target_dir(target_key).join("runs").join(run_id);
        let card = ReportCard::from_mint(&receipt.mint);

        let operator = OperatorReceipt {
            target_key: target_key.to_string(),
            run_id: run_id.to_string(),
            verdict_vs_baseline: verdict,
            buckets: buckets.clone(),
            grade: receipt.mint.grade,
            failure: UserFailure::from_reasons(&receipt.mint.reason_codes),
        };

        write_file(
            &dir.join(OPERATOR_RECEIPT_FILE),
            &serde_json::to_string_pretty(&operator).context("serialize operator receipt")?,
        )?;
        write_file(
            &dir.join(REPORT_CARD_JSON_FILE),
            &serde_json::to_string_pretty(&card).context("serialize report card")?,
        )?;
        write_file(&dir.join(REPORT_CARD_TEXT_FILE), &card.render_text())?;
        Ok(())
    }

    /// Replace the view atomically: write-temp, fsync, rename.
    fn replace_view(&self, target_key: &str, view: &ViewState) -> Result<()> {
        let path = self.view_path(target_key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create view dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(view).context("serialize view state")?;
        let tmp = path.with_extension("tmp");
        {
            use std::io::Write as _;
            let mut file = std::fs::File::create(&tmp)
                .with_context(|| format!("create {}", tmp.display()))?;
            file.write_all(json.as_bytes())
                .with_context(|| format!("write {}", tmp.display()))?;
            file.sync_all()
                .with_context(|| format!("fsync {}", tmp.display()))?;
        }
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("rename view into {}", path.display()))?;
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("write {}", path.display()))
}

/// Write the wrapper result line for a recorded run. The host wrapper owns
/// the content; the library only fixes the location and the
/// `[<CODE>] <message>` shape on failure.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub fn write_wrapper_result(
    library: &Library,
    target_filename: &str,
    run_id: &str,
    exit_code: i32,
    failure: Option<&UserFailure>,
) -> Result<PathBuf> {
    let target_key = sanitize_target(target_filename);
    let dir = library.target_dir(&target_key).join("runs").join(run_id);
    let line = match failure {
        Some(f) => format!(
            "exit={exit_code}\n{}\n",
            weft_core::exit::format_failure(&f.primary_reason, &format!("{:?}", f.primary_remedy))
        ),
        None => format!("exit={exit_code}\nok\n"),
    };
    let path = dir.join(WRAPPER_RESULT_FILE);
    write_file(&path, &line)?;
    Ok(path)
}

// ===========================================================================
// Tests
// ===========================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use weft_core::receipt::MintReceipt;
    use weft_core::{ArtifactKind, Grade, WebLane};

    fn receipt(digest: &str, kind_count: u64) -> SafeRunReceipt {
        SafeRunReceipt {
            mint: MintReceipt {
                schema: MintReceipt::SCHEMA_V1.to_string(),
                artifact_kind: ArtifactKind::Text,
                artifact_fingerprint: "fnv1a32:00000001".to_string(),
                artifact_digest: digest.to_string(),
                capture_digest: weft_canon::sha256_digest(b"capture"),
                kind_counts: BTreeMap::from([("txt".to_string(), kind_count)]),
                bounded_bytes: 10 * kind_count,
                truncated: false,
                external_refs: vec![],
                web_lane: WebLane::NotApplicable,
                probes: vec![],
                grade: Grade::Ok,
                reason_codes: vec![],
                mint_digest: None,
            },
            policy_digest: None,
            host_truth: None,
        }
    }

    #[test]
    fn first_run_has_no_baseline_verdict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let recorded = library
            .record_run("app.zip", &receipt("sha256:one", 1))
            .expect("record");
        assert!(recorded.verdict.is_none());
        assert!(recorded.run_id.starts_with("run_"));
        let view = library.view("app.zip").expect("view");
        assert_eq!(view.latest_run_id.as_deref(), Some(recorded.run_id.as_str()));
    }

    #[test]
    fn same_input_twice_reports_same() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let r = receipt("sha256:one", 1);
        let first = library.record_run("app.zip", &r).expect("record");
        library
            .accept_baseline("app.zip", &first.run_id)
            .expect("accept");
        let second = library.record_run("app.zip", &r).expect("record");
        assert_eq!(second.verdict, Some(CompareVerdict::Same));
        assert!(second.buckets.is_empty());
        // Identical content re-uses the content-derived folder.
        assert_eq!(first.run_id, second.run_id);
    }

    #[test]
    fn modified_input_reports_changed_with_buckets() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let first = library
            .record_run("app.zip", &receipt("sha256:one", 1))
            .expect("record");
        library
            .accept_baseline("app.zip", &first.run_id)
            .expect("accept");
        let second = library
            .record_run("app.zip", &receipt("sha256:two", 2))
            .expect("record");
        assert_eq!(second.verdict, Some(CompareVerdict::Changed));
        assert!(second.buckets.contains(&Bucket::C));
        assert!(second.buckets.contains(&Bucket::D));
    }

    #[test]
    fn frozen_baseline_blocks_until_accept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let first = library
            .record_run("app.zip", &receipt("sha256:one", 1))
            .expect("record");
        library
            .accept_baseline("app.zip", &first.run_id)
            .expect("accept");
        library.freeze_baseline("app.zip").expect("freeze");

        let second = library
            .record_run("app.zip", &receipt("sha256:two", 1))
            .expect("record");
        assert_eq!(second.verdict, Some(CompareVerdict::Blocked));

        // Accepting the new run unblocks the target.
        library
            .accept_baseline("app.zip", &second.run_id)
            .expect("accept");
        let third = library
            .record_run("app.zip", &receipt("sha256:two", 1))
            .expect("record");
        assert_eq!(third.verdict, Some(CompareVerdict::Same));
    }

    #[test]
    fn run_folder_holds_the_four_receipt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let recorded = library
            .record_run("app.zip", &receipt("sha256:one", 1))
            .expect("record");
        let run_dir = dir
            .path()
            .join(sanitize_target("app.zip"))
            .join("runs")
            .join(&recorded.run_id);
        for file in [
            SAFE_RUN_RECEIPT_FILE,
            OPERATOR_RECEIPT_FILE,
            REPORT_CARD_TEXT_FILE,
            REPORT_CARD_JSON_FILE,
        ] {
            assert!(run_dir.join(file).is_file(), "{file}");
        }
    }

    #[test]
    fn stored_receipt_roundtrips_structurally() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let original = receipt("sha256:one", 1);
        let recorded = library.record_run("app.zip", &original).expect("record");
        let loaded = library
            .load_run(&sanitize_target("app.zip"), &recorded.run_id)
            .expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn colliding_fingerprints_get_suffixed_folders() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        // Same fingerprint field, different content.
        let a = receipt("sha256:one", 1);
        let mut b = receipt("sha256:two", 1);
        b.mint.artifact_fingerprint = a.mint.artifact_fingerprint.clone();

        let run_a = library.record_run("app.zip", &a).expect("record");
        let run_b = library.record_run("app.zip", &b).expect("record");
        assert_ne!(run_a.run_id, run_b.run_id);
    }

    #[test]
    fn sanitize_bounds_and_cleans_the_key() {
        assert_eq!(sanitize_target("my app (v2).zip"), "my_app__v2_.zip");
        assert_eq!(sanitize_target(""), "_");
        let long = "x".repeat(200);
        assert_eq!(sanitize_target(&long).len(), MAX_TARGET_KEY_LEN);
    }

    #[test]
    fn wrapper_result_lands_next_to_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let library = Library::open(dir.path()).expect("open");
        let recorded = library
            .record_run("app.zip", &receipt("sha256:one", 1))
            .expect("record");
        let path = write_wrapper_result(&library, "app.zip", &recorded.run_id, 0, None)
            .expect("write");
        assert!(path.ends_with(WRAPPER_RESULT_FILE));
        let content = std::fs::read_to_string(&path).expect("read");
        assert_eq!(content, "exit=0\nok\n");

        let failure = UserFailure::from_reasons(&[
            weft_core::codes::ARTIFACT_DIGEST_MISMATCH.to_string(),
        ])
        .expect("failure");
        let path = write_wrapper_result(&library, "app.zip", &recorded.run_id, 1, Some(&failure))
            .expect("write");
        let content = std::fs::read_to_string(&path).expect("read");
        assert!(content.starts_with("exit=1\n[ARTIFACT_DIGEST_MISMATCH]"));
    }

    #[test]
    fn view_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let run_id = {
            let library = Library::open(dir.path()).expect("open");
            library
                .record_run("app.zip", &receipt("sha256:one", 1))
                .expect("record")
                .run_id
        };
        let library = Library::open(dir.path()).expect("reopen");
        let view = library.view(&sanitize_target("app.zip")).expect("view");
        assert_eq!(view.latest_run_id.as_deref(), Some(run_id.as_str()));
    }
}
