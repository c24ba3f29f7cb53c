// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capture.
//!
//! Turns raw bytes or a directory into a bounded [`CaptureTree`]. Bounds are
//! hard caps: exceeding any one fails closed with `HOST_INPUT_OVERSIZE`,
//! never truncate-and-continue. Paths come out relative, forward-slash, and
//! NFC-normalized, sorted by path.

use crate::ExamineBounds;
use std::collections::BTreeMap;
use std::path::PathBuf;
use unicode_normalization::{UnicodeNormalization, is_nfc};
use weft_core::{CaptureEntry, CaptureTree, Issue, codes, issue::into_result};

/// What the examiner is given.
#[derive(Debug, Clone)]
pub enum ArtifactInput {
    /// A single named byte sequence.
    Bytes {
        /// File name, used for classification.
        name: String,
        /// The artifact bytes.
        bytes: Vec<u8>,
    },
    /// A directory on disk, walked with bounds.
    Dir {
        /// Root of the directory.
        root: PathBuf,
    },
    /// A pre-built tree from an external format parser, with per-entry
    /// bytes keyed by path.
    Tree {
        /// Name of the containing artifact.
        name: String,
        /// The parser-produced tree.
        tree: CaptureTree,
        /// Entry bytes keyed by tree path.
        contents: BTreeMap<String, Vec<u8>>,
    },
}

impl ArtifactInput {
    /// The display name classification keys off.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Bytes { name, .. } | Self::Tree { name, .. } => name.clone(),
            Self::Dir { root } => root
                .file_name()
                .map_or_else(|| "dir".to_string(), |n| n.to_string_lossy().into_owned()),
        }
    }
}

/// A completed capture.
#[derive(Debug, Clone)]
pub struct Capture {
    /// The bounded tree.
    pub tree: CaptureTree,
    /// SHA-256 of the artifact's canonical bytes: the raw bytes for a file
    /// input, the canonical tree for a directory.
    pub artifact_digest: String,
    /// Entry text content for observation, keyed by path, text kinds only.
    pub texts: BTreeMap<String, String>,
    /// The input name.
    pub name: String,
}

/// Kind label for a file name, lowercased extension or `file`.
#[must_use]
pub fn kind_label(name: &str) -> String {
    name.rsplit_once('.')
        .map_or_else(|| "file".to_string(), |(_, ext)| ext.to_ascii_lowercase())
}

const TEXT_KINDS: &[&str] = &["htm", "html", "js", "json", "log", "md", "mjs", "ps1", "txt"];

/// Run capture over an input.
///
/// # Errors
///
/// Returns `HOST_INPUT_OVERSIZE` issues when a bound is exceeded.
pub fn capture(input: &ArtifactInput, bounds: &ExamineBounds) -> Result<Capture, Vec<Issue>> {
    match input {
        ArtifactInput::Bytes { name, bytes } => capture_bytes(name, bytes, bounds),
        ArtifactInput::Dir { root } => capture_dir(root, bounds),
        ArtifactInput::Tree {
            name,
            tree,
            contents,
        } => capture_tree(name, tree, contents, bounds),
    }
}

fn capture_bytes(
    name: &str,
    bytes: &[u8],
    bounds: &ExamineBounds,
) -> Result<Capture, Vec<Issue>> {
    let mut issues = Vec::new();
    if bytes.len() as u64 > bounds.max_file_bytes {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$.bytes",
            format!("{} bytes", bytes.len()),
        ));
    }
    into_result((), issues)?;

    let path = normalize_path(name);
    let kind = kind_label(&path);
    let entry = CaptureEntry {
        path: path.clone(),
        kind: kind.clone(),
        size_bounded: bytes.len() as u64,
        content_digest: weft_canon::sha256_digest(bytes),
    };
    let tree = CaptureTree::new(vec![entry], false);
    let mut texts = BTreeMap::new();
    if TEXT_KINDS.contains(&kind.as_str())
        && let Ok(text) = std::str::from_utf8(bytes)
    {
        texts.insert(path, text.to_string());
    }
    Ok(Capture {
        artifact_digest: weft_canon::sha256_digest(bytes),
        tree,
        texts,
        name: name.to_string(),
    })
}

fn capture_dir(root: &std::path::Path, bounds: &ExamineBounds) -> Result<Capture, Vec<Issue>> {
    let mut issues = Vec::new();
    let mut entries = Vec::new();
    let mut texts = BTreeMap::new();
    let mut total: u64 = 0;

    let mut walker: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();
    // The walk order is host-dependent; sort before anything observes it.
    walker.sort_by_key(|e| e.path().to_path_buf());

    if walker.len() as u64 > bounds.max_files {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$.files",
            format!("{} files", walker.len()),
        ));
        weft_core::issue::sort_issues(&mut issues);
        return Err(issues);
    }

    for entry in walker {
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        let path = normalize_path(&rel);
        let bytes = match std::fs::read(entry.path()) {
            Ok(b) => b,
            Err(e) => {
                issues.push(Issue::with_detail(
                    codes::HOST_INPUT_OVERSIZE,
                    format!("$.{path}"),
                    e.to_string(),
                ));
                continue;
            }
        };
        if bytes.len() as u64 > bounds.max_file_bytes {
            issues.push(Issue::with_detail(
                codes::HOST_INPUT_OVERSIZE,
                format!("$.{path}"),
                format!("{} bytes", bytes.len()),
            ));
            continue;
        }
        total += bytes.len() as u64;
        let kind = kind_label(&path);
        if TEXT_KINDS.contains(&kind.as_str())
            && let Ok(text) = std::str::from_utf8(&bytes)
        {
            texts.insert(path.clone(), text.to_string());
        }
        entries.push(CaptureEntry {
            path,
            kind,
            size_bounded: bytes.len() as u64,
            content_digest: weft_canon::sha256_digest(&bytes),
        });
    }
    if total > bounds.max_total_bytes {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$",
            format!("{total} total bytes"),
        ));
    }
    into_result((), issues)?;

    let tree = CaptureTree::new(entries, false);
    let artifact_digest = tree
        .capture_digest()
        .map_err(|e| vec![Issue::with_detail(codes::CYCLE_IN_CANONICAL, "$", e.to_string())])?;
    Ok(Capture {
        artifact_digest,
        tree,
        texts,
        name: root
            .file_name()
            .map_or_else(|| "dir".to_string(), |n| n.to_string_lossy().into_owned()),
    })
}

fn capture_tree(
    name: &str,
    tree: &CaptureTree,
    contents: &BTreeMap<String, Vec<u8>>,
    bounds: &ExamineBounds,
) -> Result<Capture, Vec<Issue>> {
    let mut issues = Vec::new();
    if tree.len() as u64 > bounds.max_files {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$.entries",
            format!("{} entries", tree.len()),
        ));
    }
    if tree.total_bytes > bounds.max_total_bytes {
        issues.push(Issue::with_detail(
            codes::HOST_INPUT_OVERSIZE,
            "$",
            format!("{} total bytes", tree.total_bytes),
        ));
    }
    if !tree.is_sorted() {
        issues.push(Issue::with_detail(
            codes::FIELD_INVALID,
            "$.entries",
            "entries not sorted by path",
        ));
    }
    into_result((), issues)?;

    let mut texts = BTreeMap::new();
    for entry in &tree.entries {
        if TEXT_KINDS.contains(&entry.kind.as_str())
            && let Some(bytes) = contents.get(&entry.path)
            && let Ok(text) = std::str::from_utf8(bytes)
        {
            texts.insert(entry.path.clone(), text.to_string());
        }
    }
    let artifact_digest = tree
        .capture_digest()
        .map_err(|e| vec![Issue::with_detail(codes::CYCLE_IN_CANONICAL, "$", e.to_string())])?;
    Ok(Capture {
        artifact_digest,
        tree: tree.clone(),
        texts,
        name: name.to_string(),
    })
}

fn normalize_path(path: &str) -> String {
    let forward = path.replace('\\', "/");
    let trimmed = forward.trim_start_matches("./").trim_start_matches('/');
    if is_nfc(trimmed) {
        trimmed.to_string()
    } else {
        trimmed.nfc().collect()
    }
}
