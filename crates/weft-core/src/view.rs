// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-target view state.
//!
//! The only structure in the system that is overwritten in place, and only
//! ever atomically. Everything else is append-only or immutable.

use crate::kinds::{Bucket, CompareVerdict};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bound on how many recent runs the view retains.
pub const VIEW_LAST_N: usize = 10;

/// One run's standing in the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunKey {
    /// The run id.
    pub run_id: String,
    /// Verdict against the baseline at record time.
    pub verdict_vs_baseline: CompareVerdict,
    /// Buckets that fired.
    pub buckets: BTreeSet<Bucket>,
}

/// The per-target view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewState {
    /// The operator-accepted baseline run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_run_id: Option<String>,
    /// The most recent run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_run_id: Option<String>,
    /// Recent run ids, oldest → newest, bounded by [`VIEW_LAST_N`].
    pub last_n: Vec<String>,
    /// Per-run verdicts, same order as `last_n`.
    pub keys: Vec<RunKey>,
    /// `true` when the baseline is frozen pending operator acceptance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked: Option<bool>,
}

impl ViewState {
    /// Record a run, trimming to the retention bound.
    pub fn push_run(&mut self, key: RunKey) {
        self.latest_run_id = Some(key.run_id.clone());
        self.last_n.push(key.run_id.clone());
        self.keys.push(key);
        while self.last_n.len() > VIEW_LAST_N {
            self.last_n.remove(0);
            self.keys.remove(0);
        }
    }

    /// Returns `true` when the baseline is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.blocked.unwrap_or(false)
    }
}
