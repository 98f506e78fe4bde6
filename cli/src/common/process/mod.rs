//! # Shellrun Process Execution (`common::process`)
//!
//! File: cli/src/common/process/mod.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module runs external commands and captures their output without the
//! classic parent/child pipe deadlock. Each started command gets one thread per
//! output pipe; the exit status is only waited for after both pipes have hit
//! end-of-stream.
//!
//! ## Architecture
//!
//! - **`result`**: `CommandResult` (caller-facing snapshot), `LiveResult`
//!   (in-flight record) and the `ExitCode` tri-state.
//! - **`barrier`**: `CompletionBarrier` countdown latch and the `Interrupt` flag.
//! - **`observer`**: `ProcessObserver` / `TaskObserver` callback traits and role tags.
//! - **`collector`**: `OutputCollector`, one per pipe.
//! - **`coordinator`**: `CompletionCoordinator` and its inline/background drivers.
//! - **`launcher`**: `CommandSpec` and `ProcessLauncher` (synchronous and asynchronous modes).
//! - **`registry`**: `ShellSession`, the numbered ledger most callers go through.
//!
//! Data flows `ShellSession -> ProcessLauncher -> (OutputCollector x2,
//! CompletionCoordinator) -> CommandResult`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use crate::common::process::{ShellSession, ExitCode};
//! use crate::core::{config::RunnerConfig, logging::tracing_sink};
//!
//! # fn run_example() -> crate::core::error::Result<()> {
//! let session = ShellSession::new(&RunnerConfig::default(), tracing_sink());
//! let result = session.submit(&["uname".into(), "-a".into()], false)?;
//! match result.exit_code() {
//!     Some(ExitCode::Exited(0)) => println!("{}", result.stdout_lines().join("\n")),
//!     other => eprintln!("uname ended with {:?}", other),
//! }
//! session.dispose()?;
//! # Ok(())
//! # }
//! ```
//!
pub mod barrier;
pub mod collector;
pub mod coordinator;
pub mod launcher;
pub mod observer;
pub mod registry;
pub mod result;

pub use barrier::Interrupt;
pub use launcher::{CommandSpec, ProcessLauncher};
pub use observer::{
    NoTaskTracking, OutputRole, ProcessObserver, SharedObserver, SilentObserver,
};
pub use registry::{CommandRecord, RecordStatus, ShellSession};
pub use result::{CommandResult, ExitCode};
