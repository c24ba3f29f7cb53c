// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pulse ring.
//!
//! Pulses are lightweight run markers chained by digest: each record holds
//! the digest of its predecessor, the ring cap is fixed, and the chain head
//! is published in receipt summaries so a verifier can check the recent
//! window without replaying the whole history.

use weft_core::ContractError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default ring capacity.
pub const DEFAULT_RING_CAP: usize = 64;

/// One pulse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PulseRecord {
    /// Pulse kind, e.g. `run.start`, `run.deny`.
    pub kind: String,
    /// Plan the pulse belongs to.
    pub plan_digest: String,
    /// Digest of the path the pulse observed.
    pub path_digest: String,
    /// Monotonic sequence number.
    pub seq: u64,
    /// Digest of the previous pulse; the genesis marker for the first.
    pub prev_digest: String,
}

/// Chain marker carried by the first pulse.
pub const GENESIS_DIGEST: &str = "sha256:genesis";

/// The fixed-capacity digest-chained ring.
#[derive(Debug, Clone)]
pub struct PulseRing {
    pulses: VecDeque<PulseRecord>,
    cap: usize,
    next_seq: u64,
    head_digest: String,
}

impl Default for PulseRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAP)
    }
}

impl PulseRing {
    /// Create a ring with the given capacity.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            pulses: VecDeque::new(),
            cap,
            next_seq: 0,
            head_digest: GENESIS_DIGEST.to_string(),
        }
    }

    /// Append a pulse, linking it to the current head.
    ///
    /// # Errors
    ///
    /// Propagates canonicalization failures.
    pub fn push(
        &mut self,
        kind: impl Into<String>,
        plan_digest: impl Into<String>,
        path_digest: impl Into<String>,
    ) -> Result<u64, ContractError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let record = PulseRecord {
            kind: kind.into(),
            plan_digest: plan_digest.into(),
            path_digest: path_digest.into(),
            seq,
            prev_digest: self.head_digest.clone(),
        };
        self.head_digest = weft_canon::digest_value(&record)?;
        self.pulses.push_back(record);
        while self.pulses.len() > self.cap {
            self.pulses.pop_front();
        }
        Ok(seq)
    }

    /// Digest of the newest pulse; the genesis marker when empty.
    #[must_use]
    pub fn head(&self) -> &str {
        &self.head_digest
    }

    /// Retained pulses, oldest first.
    #[must_use]
    pub fn pulses(&self) -> impl Iterator<Item = &PulseRecord> {
        self.pulses.iter()
    }

    /// Number of retained pulses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    /// Returns `true` when no pulses are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// Verify the chain over the retained window: each record's `prevDigest`
    /// must equal the digest of its predecessor, and the head must equal the
    /// digest of the newest record.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::DigestMismatch`] at the first broken link.
    pub fn verify_window(&self) -> Result<(), ContractError> {
        let mut prev: Option<String> = None;
        for record in &self.pulses {
            if let Some(expected) = &prev
                && record.prev_digest != *expected
            {
                return Err(ContractError::DigestMismatch {
                    stored: record.prev_digest.clone(),
                    computed: expected.clone(),
                });
            }
            prev = Some(weft_canon::digest_value(record)?);
        }
        if let Some(newest) = prev
            && newest != self.head_digest
        {
            return Err(ContractError::DigestMismatch {
                stored: self.head_digest.clone(),
                computed: newest,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulses_chain_from_genesis() {
        let mut ring = PulseRing::default();
        assert_eq!(ring.head(), GENESIS_DIGEST);
        ring.push("run.start", "plan-1", "sha256:path").expect("push");
        ring.push("run.deny", "plan-1", "sha256:path").expect("push");
        let records: Vec<_> = ring.pulses().collect();
        assert_eq!(records[0].prev_digest, GENESIS_DIGEST);
        assert_eq!(
            records[1].prev_digest,
            weft_canon::digest_value(records[0]).expect("digest")
        );
        ring.verify_window().expect("chain holds");
    }

    #[test]
    fn head_moves_with_every_push() {
        let mut ring = PulseRing::default();
        ring.push("run.start", "plan-1", "sha256:a").expect("push");
        let head_one = ring.head().to_string();
        ring.push("run.start", "plan-1", "sha256:b").expect("push");
        assert_ne!(ring.head(), head_one);
    }

    #[test]
    fn ring_cap_drops_oldest_but_window_still_verifies() {
        let mut ring = PulseRing::new(3);
        for i in 0..6 {
            ring.push("run.start", "plan-1", format!("sha256:{i:02}"))
                .expect("push");
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.pulses().next().map(|r| r.seq), Some(3));
        ring.verify_window().expect("window verifies");
    }

    #[test]
    fn tampered_window_fails_verification() {
        let mut ring = PulseRing::new(8);
        ring.push("run.start", "plan-1", "sha256:a").expect("push");
        ring.push("run.start", "plan-1", "sha256:b").expect("push");
        if let Some(record) = ring.pulses.get_mut(1) {
            record.prev_digest = "sha256:forged".to_string();
        }
        assert!(ring.verify_window().is_err());
    }

    #[test]
    fn seq_is_monotonic_across_drops() {
        let mut ring = PulseRing::new(2);
        for _ in 0..5 {
            ring.push("run.start", "plan-1", "sha256:x").expect("push");
        }
        let seqs: Vec<u64> = ring.pulses().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }
}
