// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exit codes and failure formatting.

/// Success.
pub const EXIT_OK: i32 = 0;
/// Generic failure; stderr carries `[<CODE>] <message>`.
pub const EXIT_FAILURE: i32 = 1;
/// Adapter or host precondition failure.
pub const EXIT_HOST_PRECONDITION: i32 = 40;

/// Format a user-visible failure line.
#[must_use]
pub fn format_failure(code: &str, message: &str) -> String {
    format!("[{code}] {message}")
}
