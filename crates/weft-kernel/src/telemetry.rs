// SPDX-License-Identifier: MIT OR Apache-2.0

//! Denial telemetry.
//!
//! Every kernel denial emits exactly one event carrying the plan, the
//! caller, the capability, and the sorted reasons. No arguments, no user
//! data. Events are monotonically sequenced per kernel and mirrored to
//! `tracing` for hosts that subscribe.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Event kind for capability denials.
pub const EVENT_CAP_DENY: &str = "cap.deny";

/// One denial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DenyEvent {
    /// Always [`EVENT_CAP_DENY`].
    pub event_kind: String,
    /// Plan the kernel is frozen to.
    pub plan_digest: String,
    /// The calling block.
    pub caller_block_hash: String,
    /// The denied capability.
    pub cap_id: String,
    /// Sorted unique reasons.
    pub reason_codes: Vec<String>,
    /// Monotonic per-kernel sequence.
    pub seq: u64,
}

/// In-memory event sink, drained by the host after a session.
#[derive(Debug, Default)]
pub struct TelemetryCollector {
    events: Vec<DenyEvent>,
    next_seq: u64,
}

impl TelemetryCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a denial.
    pub fn record_deny(
        &mut self,
        plan_digest: &str,
        caller_block_hash: &str,
        cap_id: &str,
        reason_codes: Vec<String>,
    ) {
        let event = DenyEvent {
            event_kind: EVENT_CAP_DENY.to_string(),
            plan_digest: plan_digest.to_string(),
            caller_block_hash: caller_block_hash.to_string(),
            cap_id: cap_id.to_string(),
            reason_codes,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        tracing::warn!(
            cap_id = %event.cap_id,
            reasons = ?event.reason_codes,
            seq = event.seq,
            "cap.deny"
        );
        self.events.push(event);
    }

    /// All recorded events in sequence order.
    #[must_use]
    pub fn events(&self) -> &[DenyEvent] {
        &self.events
    }

    /// Number of recorded denials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` when nothing has been denied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
