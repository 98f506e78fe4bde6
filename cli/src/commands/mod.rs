//! # Shellrun Command Modules
//!
//! File: cli/src/commands/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module aggregates the top-level subcommands of the shellrun CLI and
//! makes them accessible to the main application entry point (`main.rs`).
//!
//! ## Commands
//!
//! - `run`: synchronous execution through a `ShellSession`, output replayed afterwards
//! - `spawn`: asynchronous execution, output streamed live
//! - `batch`: many commands from a file, run concurrently through one session
//!
//! Each command defines its own arguments structure and an async handler that
//! returns the exit status shellrun should terminate with.
//!

/// Synchronous single-command execution.
pub mod run;
/// Asynchronous execution with live output.
pub mod spawn;
/// Concurrent execution of a batch file.
pub mod batch;

mod console;
