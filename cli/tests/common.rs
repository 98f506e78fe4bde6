//! # Shellrun CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Shared helpers for the integration test crates in `cli/tests/`. Each test
//! file declares `mod common;` and builds its commands through `shellrun_cmd`.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::path::Path;

/// # Get Shellrun Command (`shellrun_cmd`)
///
/// Creates an `assert_cmd::Command` for the compiled `shellrun` binary.
///
/// ## Panics
/// Panics if the `shellrun` binary cannot be found via `Command::cargo_bin`.
pub fn shellrun_cmd() -> Command {
    Command::cargo_bin("shellrun").expect("Failed to find shellrun binary for testing")
}

/// A `shellrun` command that runs inside `dir` and reads its user
/// configuration from there as well, so no host config leaks into the test.
pub fn isolated_cmd(dir: &Path) -> Command {
    let mut cmd = shellrun_cmd();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("HOME", dir)
        .env_remove("RUST_LOG");
    cmd
}
