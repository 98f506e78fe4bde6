//! # Shellrun Error Types
//!
//! File: cli/src/core/error.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! This module defines the error types used throughout shellrun. Two families
//! of failure exist and they travel on different paths:
//!
//! - **Environmental failures** (a process that cannot be started, a stream that
//!   breaks mid-read, an interrupted wait) are *not* errors in the Rust sense.
//!   They are recorded in the returned `CommandResult` and logged.
//! - **Caller misuse** (an empty argument vector, using a disposed session,
//!   disposing twice) and configuration/argument problems are raised as
//!   `ShellError` values wrapped in `anyhow::Error`.
//!
//! ## Architecture
//!
//! - `ShellError`: A custom error enum using `thiserror`.
//! - `Result<T>`: A type alias for `anyhow::Result<T>`.
//!
//! ## Examples
//!
//! ```rust,ignore
//! // Raise a misuse error
//! if argv.is_empty() {
//!     anyhow::bail!(ShellError::EmptyCommand);
//! }
//!
//! // Recognise it on the caller side
//! match session.submit(&argv, false) {
//!     Err(e) if matches!(e.downcast_ref::<ShellError>(), Some(ShellError::SessionDisposed)) => {
//!         println!("session already torn down");
//!     }
//!     other => { /* ... */ }
//! }
//! ```
//!
use thiserror::Error;

/// Custom error type for shellrun.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShellError {
    #[error("Command must contain at least one token (the executable).")]
    EmptyCommand,

    #[error("Shell session has been disposed and can no longer be used.")]
    SessionDisposed,

    #[error("Shell session was already disposed.")]
    AlreadyDisposed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid environment assignment '{0}'. Expected KEY=VALUE.")]
    InvalidEnvPair(String),

    #[error("Batch file error: {0}")]
    BatchFile(String),
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;
