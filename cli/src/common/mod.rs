//! # Shellrun Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Shared building blocks used by the subcommands in `commands::`. Command
//! handlers stay thin and delegate the actual process work here.
//!
//! - **`process`**: Spawning external commands, draining their output and
//!   tracking them in a `ShellSession`.
//!

/// Executing external processes and capturing their output.
pub mod process;
