// SPDX-License-Identifier: MIT OR Apache-2.0

//! The isolated execution realm.
//!
//! A realm is built from an explicit allowlist of named facilities; nothing
//! ambient leaks in. The strict profile installs exactly one facility, the
//! kernel door, and the self-test proves the forbidden ambient set is
//! absent before any untrusted entry runs. An entry receives the door and
//! nothing else; pure compute stays synchronous inside the realm, and every
//! suspension point is a door invoke.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use weft_core::receipt::CapAttempt;
use weft_kernel::{InvokeMsg, KernelDoor};

/// The ambient facilities a strict realm must prove absent.
pub const FORBIDDEN_FACILITIES: &[&str] = &[
    "EventSource",
    "WebSocket",
    "XMLHttpRequest",
    "caches",
    "fetch",
    "importScripts",
    "indexedDB",
    "localStorage",
    "sessionStorage",
];

/// The one facility a strict realm carries.
pub const FACILITY_CAP_INVOKE: &str = "cap.invoke";

/// Builder for realm facility tables.
#[derive(Debug, Clone)]
pub struct RealmBuilder {
    facilities: BTreeSet<String>,
}

impl RealmBuilder {
    /// The strict profile: only the kernel door.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            facilities: [FACILITY_CAP_INVOKE.to_string()].into_iter().collect(),
        }
    }

    /// An empty profile, for hosts that assemble their own table.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            facilities: BTreeSet::new(),
        }
    }

    /// Add a named facility.
    #[must_use]
    pub fn with_facility(mut self, name: impl Into<String>) -> Self {
        self.facilities.insert(name.into());
        self
    }

    /// Seal the table into a realm.
    #[must_use]
    pub fn build(self) -> Realm {
        Realm {
            facilities: self.facilities,
        }
    }
}

/// A sealed realm: an immutable facility table.
#[derive(Debug, Clone)]
pub struct Realm {
    facilities: BTreeSet<String>,
}

impl Realm {
    /// The facility table, sorted.
    #[must_use]
    pub fn facilities(&self) -> &BTreeSet<String> {
        &self.facilities
    }

    /// Prove the forbidden ambient set is absent.
    ///
    /// # Errors
    ///
    /// Returns the sorted list of forbidden facilities found.
    pub fn self_test(&self) -> Result<(), Vec<String>> {
        let mut found: Vec<String> = FORBIDDEN_FACILITIES
            .iter()
            .filter(|name| self.facilities.contains(**name))
            .map(|name| (*name).to_string())
            .collect();
        if found.is_empty() {
            Ok(())
        } else {
            found.sort();
            Err(found)
        }
    }
}

/// An executable entry. The door is the entry's entire world.
#[async_trait]
pub trait RealmEntry: Send + Sync {
    /// Run to completion. Returning `Err` marks the execution failed; the
    /// kernel's verdicts are accounted separately.
    async fn run(&self, door: KernelDoor) -> Result<(), EntryError>;
}

/// Why an entry stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entry failed: {message}")]
pub struct EntryError {
    /// Bounded, host-safe description.
    pub message: String,
}

impl EntryError {
    /// Build an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A deterministic entry that replays a fixed list of capability requests
/// and records what the kernel answered. Backs the examiner's probes and
/// the loader tests.
pub struct ScriptedEntry {
    steps: Vec<InvokeMsg>,
    attempts: Arc<Mutex<Vec<CapAttempt>>>,
}

impl std::fmt::Debug for ScriptedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEntry")
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

impl ScriptedEntry {
    /// Build an entry from prepared messages and a shared attempt sink.
    #[must_use]
    pub fn new(steps: Vec<InvokeMsg>, attempts: Arc<Mutex<Vec<CapAttempt>>>) -> Self {
        Self { steps, attempts }
    }
}

#[async_trait]
impl RealmEntry for ScriptedEntry {
    async fn run(&self, door: KernelDoor) -> Result<(), EntryError> {
        for msg in &self.steps {
            let Some(outcome) = door.invoke(msg.clone()).await else {
                return Err(EntryError::new("door closed mid-script"));
            };
            self.attempts
                .lock()
                .map_err(|_| EntryError::new("attempt sink poisoned"))?
                .push(CapAttempt {
                    cap_id: msg.cap_id.clone(),
                    allowed: outcome.ok,
                    reason_codes: outcome.reason_codes,
                });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_realm_passes_its_self_test() {
        let realm = RealmBuilder::strict().build();
        realm.self_test().expect("strict realm is clean");
        assert_eq!(realm.facilities().len(), 1);
        assert!(realm.facilities().contains(FACILITY_CAP_INVOKE));
    }

    #[test]
    fn forbidden_facility_fails_the_self_test() {
        let realm = RealmBuilder::strict().with_facility("fetch").build();
        let found = realm.self_test().expect_err("fetch is forbidden");
        assert_eq!(found, vec!["fetch"]);
    }

    #[test]
    fn self_test_reports_every_forbidden_facility_sorted() {
        let realm = RealmBuilder::bare()
            .with_facility("localStorage")
            .with_facility("fetch")
            .with_facility("WebSocket")
            .build();
        let found = realm.self_test().expect_err("three forbidden");
        assert_eq!(found, vec!["WebSocket", "fetch", "localStorage"]);
    }

    #[test]
    fn harmless_extra_facilities_pass() {
        let realm = RealmBuilder::strict().with_facility("console.log").build();
        realm.self_test().expect("console is not forbidden");
    }
}
