// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification.
//!
//! Classification is a closed decision over the capture: file extension for
//! single files, marker files for directories. Format parsers stay external;
//! a ZIP is a ZIP here whether or not anyone can open it.

use crate::capture::Capture;
use weft_core::ArtifactKind;

/// Decide what an artifact is.
#[must_use]
pub fn classify(capture: &Capture) -> ArtifactKind {
    if capture.tree.len() > 1 {
        return classify_dir(capture);
    }
    match capture
        .tree
        .entries
        .first()
        .map(|e| e.kind.as_str())
        .unwrap_or("file")
    {
        "zip" => ArtifactKind::Zip,
        "exe" => ArtifactKind::NativeExe,
        "msi" => ArtifactKind::NativeMsi,
        "lnk" => ArtifactKind::ShortcutLnk,
        "js" | "mjs" => ArtifactKind::ScriptJs,
        "ps1" => ArtifactKind::ScriptPs1,
        "txt" | "md" | "log" => ArtifactKind::Text,
        _ => ArtifactKind::Unknown,
    }
}

fn classify_dir(capture: &Capture) -> ArtifactKind {
    let has = |name: &str| capture.tree.entries.iter().any(|e| e.path == name);
    if has("release_manifest.json") {
        return ArtifactKind::ReleaseDir;
    }
    if has("index.html") || has("index.htm") {
        return ArtifactKind::WebDir;
    }
    ArtifactKind::Unknown
}
