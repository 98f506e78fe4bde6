//! # Shellrun Library
//!
//! File: cli/src/lib.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The process runner behind the `shellrun` binary, usable on its own:
//!
//! - `common::process`: launching external programs, draining their output
//!   streams on dedicated threads and reporting completion, plus the
//!   `ShellSession` registry of numbered commands.
//! - `core`: errors, layered configuration and the injectable log sink.
//! - `commands`: the CLI subcommand handlers driven by `main.rs`.
//!
pub mod commands;
pub mod common;
pub mod core;
