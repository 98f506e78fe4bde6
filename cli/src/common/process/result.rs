//! # Command Results (`common::process::result`)
//!
//! File: cli/src/common/process/result.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Two views of the same data live here:
//!
//! - **`LiveResult`**: the in-flight record owned by one command. Output
//!   collectors append lines to it while the streams are open and the
//!   completion coordinator sets its exit code exactly once.
//! - **`CommandResult`**: an owned, immutable copy handed to callers. Nothing a
//!   caller does with it can reach back into the live record.
//!
//! ## Exit codes
//!
//! `ExitCode` separates the three ways a command can end:
//! `Exited(code)` (the OS reported a status), `Interrupted` (the wait was
//! abandoned, the status is unknown) and `NotStarted` (the process could not be
//! created). `code()` collapses the latter two to `-1` for callers that only
//! want an integer, but success is decided on the variant, so `Interrupted`
//! and `NotStarted` never count as successful even when the target is `-1`.
//!
use super::observer::StreamRole;
use serde::Serialize;
use std::fmt;
use std::process::ExitStatus;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "code", rename_all = "snake_case")]
pub enum ExitCode {
    Exited(i32),
    Interrupted,
    NotStarted,
}

impl ExitCode {
    /// Integer reported for outcomes without a real exit status.
    pub const SENTINEL: i32 = -1;

    /// The legacy integer form of this outcome.
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Exited(code) => code,
            ExitCode::Interrupted | ExitCode::NotStarted => Self::SENTINEL,
        }
    }

    /// Converts an OS status. Signal deaths map to `128 + signal`.
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitCode::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitCode::Exited(128 + signal);
            }
        }
        ExitCode::Interrupted
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Exited(code) => write!(f, "{}", code),
            ExitCode::Interrupted => f.write_str("interrupted"),
            ExitCode::NotStarted => f.write_str("not started"),
        }
    }
}

/// Immutable snapshot of a command's outcome and captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    target_exit_code: i32,
    exit_code: Option<ExitCode>,
    stdout_lines: Vec<String>,
    stderr_lines: Vec<String>,
    elapsed_ms: Option<u64>,
}

impl CommandResult {
    /// A result for a command that has not terminated yet.
    pub fn pending(target_exit_code: i32) -> Self {
        Self {
            target_exit_code,
            exit_code: None,
            stdout_lines: Vec::new(),
            stderr_lines: Vec::new(),
            elapsed_ms: None,
        }
    }

    /// A result for a command that has terminated.
    pub fn completed(
        target_exit_code: i32,
        exit_code: ExitCode,
        stdout_lines: Vec<String>,
        stderr_lines: Vec<String>,
    ) -> Self {
        Self {
            target_exit_code,
            exit_code: Some(exit_code),
            stdout_lines,
            stderr_lines,
            elapsed_ms: None,
        }
    }

    /// The exit code that counts as success for this command.
    pub fn target_exit_code(&self) -> i32 {
        self.target_exit_code
    }

    /// How the command ended, or `None` while it is still running.
    pub fn exit_code(&self) -> Option<ExitCode> {
        self.exit_code
    }

    /// Captured stdout lines in the order they were read, terminators stripped.
    pub fn stdout_lines(&self) -> &[String] {
        &self.stdout_lines
    }

    /// Captured stderr lines in the order they were read, terminators stripped.
    pub fn stderr_lines(&self) -> &[String] {
        &self.stderr_lines
    }

    /// Wall-clock time from launch to completion, once completed.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_ms.map(Duration::from_millis)
    }

    /// # Is Completed (`is_completed`)
    ///
    /// True once an exit code is known, including `Interrupted` and `NotStarted`.
    pub fn is_completed(&self) -> bool {
        self.exit_code.is_some()
    }

    /// # Is Successful (`is_successful`)
    ///
    /// True only when the process exited with exactly the target exit code.
    /// `Interrupted` and `NotStarted` never count, whatever the target.
    pub fn is_successful(&self) -> bool {
        self.exit_code == Some(ExitCode::Exited(self.target_exit_code))
    }

    /// # Is Failed (`is_failed`)
    ///
    /// Completed but not successful. A running command is neither.
    pub fn is_failed(&self) -> bool {
        self.is_completed() && !self.is_successful()
    }
}

/// The mutable record shared by one command's tasks.
///
/// Each stream list is written by exactly one collector. The exit code is a
/// `OnceLock`, so a second completion attempt is ignored rather than
/// overwriting the first. Once completed, appends are dropped.
#[derive(Debug)]
pub struct LiveResult {
    target_exit_code: i32,
    exit_code: OnceLock<ExitCode>,
    stdout_lines: Mutex<Vec<String>>,
    stderr_lines: Mutex<Vec<String>>,
    started: Instant,
    elapsed: OnceLock<Duration>,
}

impl LiveResult {
    /// Starts the clock for a command expected to exit with `target_exit_code`.
    pub fn new(target_exit_code: i32) -> Self {
        Self {
            target_exit_code,
            exit_code: OnceLock::new(),
            stdout_lines: Mutex::new(Vec::new()),
            stderr_lines: Mutex::new(Vec::new()),
            started: Instant::now(),
            elapsed: OnceLock::new(),
        }
    }

    /// Appends a line to the stream's list. Returns `false` if the result is frozen.
    pub fn push_line(&self, role: StreamRole, line: &str) -> bool {
        let list = match role {
            StreamRole::Out => &self.stdout_lines,
            StreamRole::Err => &self.stderr_lines,
        };
        let mut lines = list.lock().unwrap_or_else(|e| e.into_inner());
        if self.exit_code.get().is_some() {
            return false;
        }
        lines.push(line.to_string());
        true
    }

    /// # Complete (`complete`)
    ///
    /// Records the exit code. Only the first call has an effect.
    ///
    /// Both line lists stay locked while the exit code is set, so an append
    /// either lands before completion or is refused.
    pub fn complete(&self, exit_code: ExitCode) -> bool {
        let _stdout = self.stdout_lines.lock().unwrap_or_else(|e| e.into_inner());
        let _stderr = self.stderr_lines.lock().unwrap_or_else(|e| e.into_inner());
        let first = self.exit_code.set(exit_code).is_ok();
        if first {
            let _ = self.elapsed.set(self.started.elapsed());
        }
        first
    }

    /// Whether `complete` has been called.
    pub fn is_completed(&self) -> bool {
        self.exit_code.get().is_some()
    }

    /// Copies the current state into an owned `CommandResult`.
    pub fn snapshot(&self) -> CommandResult {
        let stdout_lines = self
            .stdout_lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let stderr_lines = self
            .stderr_lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        CommandResult {
            target_exit_code: self.target_exit_code,
            exit_code: self.exit_code.get().copied(),
            stdout_lines,
            stderr_lines,
            elapsed_ms: self
                .elapsed
                .get()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }
}
