//! # Shell Session Registry (`common::process::registry`)
//!
//! File: cli/src/common/process/registry.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! A `ShellSession` is the entry point most callers use. It numbers every
//! submitted command, optionally keeps a `CommandRecord` for each one, rewrites
//! commands for privilege elevation, and runs them in synchronous mode.
//!
//! ## Locking
//!
//! - The session state (id counter, record map, disposed flag) sits behind one
//!   mutex. Ids are allocated and records inserted under that lock, so ids are
//!   unique and increase in submission order.
//! - Each record has its own mutex guarding its active-task map, result and
//!   finish time. Collector threads update the task map concurrently with
//!   snapshots; a snapshot copies a record while holding its lock, so it never
//!   sees a half-applied update.
//!
//! ## Lifecycle
//!
//! `dispose` clears every record and permanently retires the session. Any
//! later `submit`, `snapshot`, `clear` or `dispose` fails with a `ShellError`.
//! Commands still running at that moment finish normally, but their updates
//! land on records that are no longer stored and are dropped.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let session = ShellSession::new(&RunnerConfig::default(), tracing_sink());
//! let result = session.submit(&["ls".into(), "-la".into()], false)?;
//! for (id, record) in session.snapshot()? {
//!     println!("{} {:?} {}", id, record.status(), record.command.join(" "));
//! }
//! session.dispose()?;
//! ```
//!
use super::launcher::{CommandSpec, ProcessLauncher};
use super::observer::{NoTaskTracking, SharedObserver, SilentObserver, TaskObserver, TaskRole};
use super::result::CommandResult;
use crate::core::config::RunnerConfig;
use crate::core::error::{Result, ShellError};
use crate::core::logging::SharedSink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// A background thread currently working for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTask {
    pub role: TaskRole,
    pub thread: String,
    pub started_at: DateTime<Utc>,
}

/// Derived state of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Running,
    Succeeded,
    Failed,
}

/// Copy of one command's bookkeeping, as returned by `ShellSession::snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub id: u64,
    /// The argument vector actually executed, elevation prefix included.
    pub command: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub active_tasks: BTreeMap<TaskRole, ActiveTask>,
    pub result: Option<CommandResult>,
}

impl CommandRecord {
    pub fn status(&self) -> RecordStatus {
        match &self.result {
            None => RecordStatus::Running,
            Some(result) if result.is_successful() => RecordStatus::Succeeded,
            Some(_) => RecordStatus::Failed,
        }
    }
}

#[derive(Debug, Default)]
struct RecordState {
    active_tasks: BTreeMap<TaskRole, ActiveTask>,
    result: Option<CommandResult>,
    finished_at: Option<DateTime<Utc>>,
}

/// Live record shared between the session map and the command's threads.
#[derive(Debug)]
struct RecordCell {
    id: u64,
    command: Vec<String>,
    submitted_at: DateTime<Utc>,
    detached: AtomicBool,
    state: Mutex<RecordState>,
}

impl RecordCell {
    fn new(id: u64, command: Vec<String>) -> Self {
        Self {
            id,
            command,
            submitted_at: Utc::now(),
            detached: AtomicBool::new(false),
            state: Mutex::new(RecordState::default()),
        }
    }

    /// Applies `f` unless the record has been removed from its session.
    fn update(&self, f: impl FnOnce(&mut RecordState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if self.detached.load(Ordering::SeqCst) {
            return;
        }
        f(&mut state);
    }

    /// Marks the record as no longer stored and drops what it holds.
    fn detach(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.detached.store(true, Ordering::SeqCst);
        state.active_tasks.clear();
        state.result = None;
    }

    fn snapshot(&self) -> CommandRecord {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        CommandRecord {
            id: self.id,
            command: self.command.clone(),
            submitted_at: self.submitted_at,
            finished_at: state.finished_at,
            active_tasks: state.active_tasks.clone(),
            result: state.result.clone(),
        }
    }
}

/// Keeps a record's active-task map in step with the command's threads.
struct RecordTasks(Arc<RecordCell>);

impl TaskObserver for RecordTasks {
    fn on_task_started(&self, role: TaskRole, thread_name: &str) {
        let task = ActiveTask {
            role,
            thread: thread_name.to_string(),
            started_at: Utc::now(),
        };
        self.0.update(|state| {
            state.active_tasks.insert(role, task);
        });
    }

    fn on_task_finished(&self, role: TaskRole) {
        self.0.update(|state| {
            state.active_tasks.remove(&role);
        });
    }
}

#[derive(Debug, Default)]
struct SessionState {
    last_id: u64,
    records: BTreeMap<u64, Arc<RecordCell>>,
    disposed: bool,
}

/// Numbered, thread-safe ledger of commands run in synchronous mode.
pub struct ShellSession {
    launcher: ProcessLauncher,
    retain_records: bool,
    log_commands: bool,
    elevation_prefix: Vec<String>,
    state: Mutex<SessionState>,
}

impl ShellSession {
    pub fn new(config: &RunnerConfig, sink: SharedSink) -> Self {
        let launcher = ProcessLauncher::new(sink, Duration::from_millis(config.poll_interval_ms))
            .with_default_workdir(config.default_workdir.as_ref().map(PathBuf::from));
        Self {
            launcher,
            retain_records: config.retain_records,
            log_commands: config.log_commands,
            elevation_prefix: config.elevation_prefix.clone(),
            state: Mutex::new(SessionState::default()),
        }
    }

    /// # Submit (`submit`)
    ///
    /// Runs `argv` to completion with default settings.
    pub fn submit(&self, argv: &[String], elevate: bool) -> Result<CommandResult> {
        let observer = Arc::new(SilentObserver {
            log_commands: self.log_commands,
        });
        self.submit_with(CommandSpec::new(argv.to_vec())?, elevate, observer)
    }

    /// # Submit With Spec (`submit_with`)
    ///
    /// Runs a fully specified command to completion.
    ///
    /// Errors only for misuse (disposed session). Everything that can go wrong
    /// with the process itself is reported in the returned `CommandResult`.
    #[instrument(skip_all, fields(elevate = elevate))]
    pub fn submit_with(
        &self,
        spec: CommandSpec,
        elevate: bool,
        observer: SharedObserver,
    ) -> Result<CommandResult> {
        let spec = if elevate {
            spec.elevated(&self.elevation_prefix)
        } else {
            spec
        };

        let (id, record) = {
            let mut state = self.lock_state();
            if state.disposed {
                anyhow::bail!(ShellError::SessionDisposed);
            }
            state.last_id += 1;
            let id = state.last_id;
            let record = self.retain_records.then(|| {
                let cell = Arc::new(RecordCell::new(id, spec.argv().to_vec()));
                state.records.insert(id, Arc::clone(&cell));
                cell
            });
            (id, record)
        };
        info!("Submitting command #{}: {}", id, spec.command_line());

        let result = match &record {
            Some(cell) => {
                let tasks = Arc::new(RecordTasks(Arc::clone(cell)));
                let result = self.launcher.run_sync(spec, observer, tasks);
                cell.update(|state| {
                    state.result = Some(result.clone());
                    state.finished_at = Some(Utc::now());
                });
                result
            }
            None => self.launcher.run_sync(spec, observer, Arc::new(NoTaskTracking)),
        };
        debug!(
            "Command #{} finished with {:?}",
            id,
            result.exit_code()
        );
        Ok(result)
    }

    /// # Snapshot (`snapshot`)
    ///
    /// Copies of every retained record, keyed by id.
    pub fn snapshot(&self) -> Result<BTreeMap<u64, CommandRecord>> {
        let state = self.lock_state();
        if state.disposed {
            anyhow::bail!(ShellError::SessionDisposed);
        }
        Ok(state
            .records
            .iter()
            .map(|(id, cell)| (*id, cell.snapshot()))
            .collect())
    }

    /// Drops all retained records. The id counter keeps counting.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.disposed {
            anyhow::bail!(ShellError::SessionDisposed);
        }
        for cell in std::mem::take(&mut state.records).into_values() {
            cell.detach();
        }
        Ok(())
    }

    /// # Dispose (`dispose`)
    ///
    /// Clears every record and retires the session for good.
    pub fn dispose(&self) -> Result<()> {
        let mut state = self.lock_state();
        if state.disposed {
            anyhow::bail!(ShellError::AlreadyDisposed);
        }
        for cell in std::mem::take(&mut state.records).into_values() {
            cell.detach();
        }
        state.disposed = true;
        info!("Shell session disposed after {} command(s)", state.last_id);
        Ok(())
    }

    /// Whether `dispose` has run.
    pub fn is_disposed(&self) -> bool {
        self.lock_state().disposed
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
