// SPDX-License-Identifier: MIT OR Apache-2.0

//! The on-disk release set.
//!
//! A release directory holds exactly four files: `release_manifest.json`,
//! `runtime_bundle.json`, `release_public_key.json`, and `evidence.json`.

use crate::keys::KeyAllowlist;
use anyhow::{Context, Result};
use std::path::Path;
use weft_core::{EvidenceRecord, ReleaseManifest, RuntimeBundle};

/// File name of the manifest.
pub const RELEASE_MANIFEST_FILE: &str = "release_manifest.json";
/// File name of the bundle.
pub const RUNTIME_BUNDLE_FILE: &str = "runtime_bundle.json";
/// File name of the pinned key allowlist.
pub const RELEASE_PUBLIC_KEY_FILE: &str = "release_public_key.json";
/// File name of the evidence set.
pub const EVIDENCE_FILE: &str = "evidence.json";

/// The four release artifacts, loaded together.
#[derive(Debug, Clone)]
pub struct ReleaseFileSet {
    /// The signed manifest.
    pub manifest: ReleaseManifest,
    /// The runtime bundle.
    pub bundle: RuntimeBundle,
    /// The pinned keys.
    pub allowlist: KeyAllowlist,
    /// The bound evidence records.
    pub evidence: Vec<EvidenceRecord>,
}

impl ReleaseFileSet {
    /// Load a release set from the directory named by `WEFTEND_RELEASE_DIR`.
    ///
    /// # Errors
    ///
    /// Returns an error when the knob is unset or a file fails to load.
    pub fn load_from_config(config: &weft_core::EnvConfig) -> Result<Self> {
        let dir = config
            .release_dir
            .as_deref()
            .context("WEFTEND_RELEASE_DIR is not set")?;
        Self::load(dir)
    }

    /// Load a release set from a directory.
    ///
    /// # Errors
    ///
    /// Returns an error naming the file that failed to read or parse.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            manifest: read_json(dir, RELEASE_MANIFEST_FILE)?,
            bundle: read_json(dir, RUNTIME_BUNDLE_FILE)?,
            allowlist: read_json(dir, RELEASE_PUBLIC_KEY_FILE)?,
            evidence: read_json(dir, EVIDENCE_FILE)?,
        })
    }

    /// Write a release set into a directory.
    ///
    /// # Errors
    ///
    /// Returns an error naming the file that failed to serialize or write.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create release dir {}", dir.display()))?;
        write_json(dir, RELEASE_MANIFEST_FILE, &self.manifest)?;
        write_json(dir, RUNTIME_BUNDLE_FILE, &self.bundle)?;
        write_json(dir, RELEASE_PUBLIC_KEY_FILE, &self.allowlist)?;
        write_json(dir, EVIDENCE_FILE, &self.evidence)?;
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(dir: &Path, name: &str) -> Result<T> {
    let path = dir.join(name);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parse {}", path.display()))
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))
}
