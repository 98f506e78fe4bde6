//! # Runner Observers (`common::process::observer`)
//!
//! File: cli/src/common/process/observer.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The launcher reports everything it does through two callback traits:
//!
//! - **`ProcessObserver`**: per-command events (output lines, started,
//!   start failure, completion) plus whether the command line should be
//!   echoed before start.
//! - **`TaskObserver`**: lifecycle of the background threads a command uses
//!   (the two output collectors and, in asynchronous mode, the completion
//!   coordinator). The session registry uses it to keep each record's
//!   active-task map current.
//!
//! Both traits are called from background threads, hence `Send + Sync`.
//!
use super::result::ExitCode;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Which pipe an output collector drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    Out,
    Err,
}

/// Tag attached to every line delivered to `ProcessObserver::on_shell_output`.
///
/// `Cmd` marks the synthetic echo of the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputRole {
    Cmd,
    Out,
    Err,
}

impl From<StreamRole> for OutputRole {
    fn from(role: StreamRole) -> Self {
        match role {
            StreamRole::Out => OutputRole::Out,
            StreamRole::Err => OutputRole::Err,
        }
    }
}

impl fmt::Display for OutputRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputRole::Cmd => "CMD",
            OutputRole::Out => "OUT",
            OutputRole::Err => "ERR",
        })
    }
}

/// Background thread kinds tracked per command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRole {
    StdOut,
    StdErr,
    Completion,
}

impl TaskRole {
    pub fn thread_name(self) -> &'static str {
        match self {
            TaskRole::StdOut => "shellrun-stdout",
            TaskRole::StdErr => "shellrun-stderr",
            TaskRole::Completion => "shellrun-completion",
        }
    }
}

impl From<StreamRole> for TaskRole {
    fn from(role: StreamRole) -> Self {
        match role {
            StreamRole::Out => TaskRole::StdOut,
            StreamRole::Err => TaskRole::StdErr,
        }
    }
}

/// Receives the events of one command.
pub trait ProcessObserver: Send + Sync {
    /// Whether the launcher should emit the command line as a `Cmd` line first.
    fn needs_command_logging(&self) -> bool;

    /// One line of output, in stream order.
    fn on_shell_output(&self, role: OutputRole, line: &str);

    /// The process exists and its output collectors are about to start.
    fn on_process_started(&self);

    /// The process could not be created. No further events follow.
    fn on_process_start_failed(&self, cause: &anyhow::Error);

    /// Called exactly once per started process, after both streams drained.
    fn on_process_complete(&self, exit_code: ExitCode);
}

/// Receives start/finish notifications for background threads.
pub trait TaskObserver: Send + Sync {
    /// Called on the task's own thread before it does any work.
    fn on_task_started(&self, role: TaskRole, thread_name: &str);
    /// Called on the task's own thread as its last action.
    fn on_task_finished(&self, role: TaskRole);
}

/// Observer that ignores everything except the command-echo setting.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentObserver {
    pub log_commands: bool,
}

impl ProcessObserver for SilentObserver {
    fn needs_command_logging(&self) -> bool {
        self.log_commands
    }
    fn on_shell_output(&self, _role: OutputRole, _line: &str) {}
    fn on_process_started(&self) {}
    fn on_process_start_failed(&self, _cause: &anyhow::Error) {}
    fn on_process_complete(&self, _exit_code: ExitCode) {}
}

/// Task observer for callers that do not track threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTaskTracking;

impl TaskObserver for NoTaskTracking {
    fn on_task_started(&self, _role: TaskRole, _thread_name: &str) {}
    fn on_task_finished(&self, _role: TaskRole) {}
}

/// Observer handle shared between a command's threads.
pub type SharedObserver = Arc<dyn ProcessObserver>;
/// Task-observer handle shared between a command's threads.
pub type SharedTaskObserver = Arc<dyn TaskObserver>;
