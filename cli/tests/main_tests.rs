//! # Shellrun CLI Main Integration Tests
//!
//! File: cli/tests/main_tests.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Verifies top-level behavior of the `shellrun` binary: standard flags and
//! argument validation that happens before any command is run.
//!

mod common;
use common::shellrun_cmd;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    shellrun_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("spawn"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_version_flag() {
    shellrun_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_subcommand_fails() {
    shellrun_cmd().assert().failure();
}

#[test]
fn test_run_requires_a_command() {
    shellrun_cmd()
        .args(["run", "--"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}
