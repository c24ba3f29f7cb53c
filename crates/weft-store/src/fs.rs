// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed artifact store.
//!
//! Writes are atomic: bytes land in a temp file, the file is fsynced, and
//! the temp is renamed over the final key. Writes are serialized per key by
//! a store-wide lock; concurrent reads never observe a partial write.

use crate::{ArtifactStore, StoreError, safe_digest};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A store rooted at a directory, one file per digest key.
#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsStore {
    /// Open (and create) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] when the root cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn key_path(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{}.bin", safe_digest(digest)))
    }

    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl ArtifactStore for FsStore {
    fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let digest = weft_canon::sha256_digest(bytes);
        let path = self.key_path(&digest);
        let _guard = self.write_lock.lock().expect("store mutex poisoned");
        if !path.exists() {
            self.write_atomic(&path, bytes)?;
            tracing::debug!(%digest, "artifact stored");
        }
        Ok(digest)
    }

    fn get(&self, digest: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.key_path(digest);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::Missing {
                    digest: digest.to_string(),
                });
            }
            Err(e) => return Err(StoreError::Io(e)),
        };
        let observed = weft_canon::sha256_digest(&bytes);
        if observed != digest {
            return Err(StoreError::DigestMismatch {
                digest: digest.to_string(),
                observed,
            });
        }
        Ok(bytes)
    }

    fn contains(&self, digest: &str) -> bool {
        self.key_path(digest).exists()
    }
}
