// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide configuration.
//!
//! The environment is read exactly once, at process start, into a frozen
//! struct. Nothing else in the engine may touch `std::env`; pure logic that
//! needs a knob receives it as an argument.

use std::path::PathBuf;

/// Gates the demo signer used for fixtures.
pub const ENV_ALLOW_DEMO_CRYPTO: &str = "WEFTEND_ALLOW_DEMO_CRYPTO";
/// Points at the release fixture directory.
pub const ENV_RELEASE_DIR: &str = "WEFTEND_RELEASE_DIR";
/// Deterministic input override for the verify-360 gate.
pub const ENV_360_INPUT: &str = "WEFTEND_360_INPUT";

/// The three recognized knobs, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// `true` when `WEFTEND_ALLOW_DEMO_CRYPTO=1`.
    pub allow_demo_crypto: bool,
    /// `WEFTEND_RELEASE_DIR`, if set.
    pub release_dir: Option<PathBuf>,
    /// `WEFTEND_360_INPUT`, if set.
    pub input_360: Option<String>,
}

impl EnvConfig {
    /// Capture the environment. Call once at process start.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            allow_demo_crypto: std::env::var(ENV_ALLOW_DEMO_CRYPTO)
                .map(|v| v == "1")
                .unwrap_or(false),
            release_dir: std::env::var_os(ENV_RELEASE_DIR).map(PathBuf::from),
            input_360: std::env::var(ENV_360_INPUT).ok(),
        }
    }

    /// A config with every knob off, for tests and embedders.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }
}
