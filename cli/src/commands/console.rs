//! # Shellrun Console Helpers
//!
//! File: cli/src/commands/console.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! Pieces shared by the `run`, `spawn` and `batch` handlers:
//!
//! - `ConsoleObserver`: a `ProcessObserver` that writes to the terminal.
//! - `run_interruptible`: runs blocking process work off the async runtime and
//!   raises the command's `Interrupt` when Ctrl-C arrives.
//! - `parse_env_pair`: clap value parser for `-e KEY=VALUE`.
//! - `exit_status_for`: maps a `CommandResult` to shellrun's own exit status.
//!
use crate::common::process::{CommandResult, ExitCode, Interrupt, OutputRole, ProcessObserver};
use crate::core::error::{Result, ShellError};
use anyhow::Context;
use std::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Writes command events to the terminal.
///
/// With `live` set, output lines are printed as they arrive, stdout lines to
/// stdout and stderr lines to stderr. Echoed command lines go to stderr
/// prefixed with `$ `.
pub struct ConsoleObserver {
    echo: bool,
    live: bool,
    completion: Mutex<Option<mpsc::Sender<ExitCode>>>,
}

impl ConsoleObserver {
    pub fn new(echo: bool, live: bool) -> Self {
        Self {
            echo,
            live,
            completion: Mutex::new(None),
        }
    }

    /// Sends the exit code on `tx` when the command completes.
    pub fn with_completion(self, tx: mpsc::Sender<ExitCode>) -> Self {
        *self.completion.lock().unwrap_or_else(|e| e.into_inner()) = Some(tx);
        self
    }
}

impl ProcessObserver for ConsoleObserver {
    fn needs_command_logging(&self) -> bool {
        self.echo
    }

    fn on_shell_output(&self, role: OutputRole, line: &str) {
        match role {
            OutputRole::Cmd => eprintln!("$ {}", line),
            OutputRole::Out if self.live => println!("{}", line),
            OutputRole::Err if self.live => eprintln!("{}", line),
            _ => {}
        }
    }

    fn on_process_started(&self) {
        debug!("Process started");
    }

    fn on_process_start_failed(&self, cause: &anyhow::Error) {
        debug!("Process failed to start: {:#}", cause);
    }

    fn on_process_complete(&self, exit_code: ExitCode) {
        debug!("Process completed: {}", exit_code);
        let completion = self.completion.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = completion.as_ref() {
            if tx.send(exit_code).is_err() {
                warn!("Nobody is waiting for the completion of this command");
            }
        }
    }
}

/// Runs `work` on the blocking pool. Ctrl-C raises `interrupt` and the call
/// then waits for `work` to wind down.
pub async fn run_interruptible<T, F>(interrupt: Interrupt, work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(work);
    tokio::select! {
        joined = &mut task => return joined.context("Command runner thread panicked"),
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                warn!("Interrupt received, stopping command...");
                interrupt.raise();
            }
            Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
        },
    }
    task.await.context("Command runner thread panicked")
}

/// Parses `KEY=VALUE`. The value may be empty or contain further `=`.
pub fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), ShellError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(ShellError::InvalidEnvPair(raw.to_string())),
    }
}

/// 0 on success; otherwise the child's own non-zero exit code, or 1.
pub fn exit_status_for(result: &CommandResult) -> i32 {
    if result.is_successful() {
        return 0;
    }
    match result.exit_code() {
        Some(ExitCode::Exited(code)) if (1..=255).contains(&code) => code,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_pair() {
        assert_eq!(
            parse_env_pair("FOO=bar").unwrap(),
            ("FOO".to_string(), "bar".to_string())
        );
        assert_eq!(
            parse_env_pair("URL=a=b").unwrap(),
            ("URL".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_env_pair("EMPTY=").unwrap().1, "");
        assert_eq!(
            parse_env_pair("=value").unwrap_err(),
            ShellError::InvalidEnvPair("=value".into())
        );
        assert!(parse_env_pair("NOEQUALS").is_err());
    }

    #[test]
    fn test_exit_status_for() {
        let ok = CommandResult::completed(0, ExitCode::Exited(0), vec![], vec![]);
        assert_eq!(exit_status_for(&ok), 0);

        let expected_two = CommandResult::completed(2, ExitCode::Exited(2), vec![], vec![]);
        assert_eq!(exit_status_for(&expected_two), 0);

        let failed = CommandResult::completed(0, ExitCode::Exited(42), vec![], vec![]);
        assert_eq!(exit_status_for(&failed), 42);

        let zero_but_expected_one = CommandResult::completed(1, ExitCode::Exited(0), vec![], vec![]);
        assert_eq!(exit_status_for(&zero_but_expected_one), 1);

        let interrupted = CommandResult::completed(0, ExitCode::Interrupted, vec![], vec![]);
        assert_eq!(exit_status_for(&interrupted), 1);
    }

    #[test]
    fn test_console_observer_forwards_completion() {
        let (tx, rx) = mpsc::channel();
        let observer = ConsoleObserver::new(false, false).with_completion(tx);
        assert!(!observer.needs_command_logging());
        observer.on_process_complete(ExitCode::Exited(5));
        assert_eq!(rx.recv().unwrap(), ExitCode::Exited(5));
    }

    #[tokio::test]
    async fn test_run_interruptible_returns_work_result() {
        let value = run_interruptible(Interrupt::new(), || 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }
}
