//! # Process Launcher (`common::process::launcher`)
//!
//! File: cli/src/common/process/launcher.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! `ProcessLauncher` turns a `CommandSpec` into a running child with both
//! output pipes being drained, and offers the two execution modes built on
//! top of that:
//!
//! - **`run_async`**: returns as soon as the process has (or has not) started.
//!   A background completion thread reports the exit code through
//!   `ProcessObserver::on_process_complete`.
//! - **`run_sync`**: blocks the caller until the command has terminated. The
//!   caller's own thread performs the completion sequence, and the returned
//!   `CommandResult` contains every captured line.
//!
//! ## Launch sequence
//!
//! 1. If the observer asks for it, emit the command line as a `CMD` line.
//! 2. Resolve the working directory. A missing directory is logged and the
//!    current directory is used instead.
//! 3. Build the `std::process::Command` (stdin from null, stdout/stderr piped)
//!    and let the customisation hook adjust it.
//! 4. Spawn. On failure, report `on_process_start_failed` and stop: no threads
//!    are created.
//! 5. Report `on_process_started`, then start one `OutputCollector` per pipe,
//!    both counting down the same `CompletionBarrier`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let launcher = ProcessLauncher::new(tracing_sink(), Duration::from_millis(50));
//! let spec = CommandSpec::new(vec!["git".into(), "status".into()])?
//!     .with_workdir("/src/project");
//! let result = launcher.run_sync(spec, Arc::new(SilentObserver::default()), Arc::new(NoTaskTracking));
//! if result.is_successful() {
//!     println!("{}", result.stdout_lines().join("\n"));
//! }
//! ```
//!
use super::barrier::{CompletionBarrier, Interrupt};
use super::collector::OutputCollector;
use super::coordinator::{
    BackgroundCompletion, CompletionCoordinator, CompletionDriver, InlineCompletion,
    LaunchedProcess,
};
use super::observer::{OutputRole, ProcessObserver, SharedObserver, SharedTaskObserver, StreamRole};
use super::result::{CommandResult, ExitCode, LiveResult};
use crate::core::error::{Result, ShellError};
use crate::core::logging::{LogLevel, SharedSink};
use anyhow::anyhow;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Adjusts the process configuration just before spawning.
pub type BuilderHook = Box<dyn FnOnce(&mut Command) -> Result<()> + Send>;

/// Everything needed to start one command.
pub struct CommandSpec {
    argv: Vec<String>,
    workdir: Option<PathBuf>,
    target_exit_code: i32,
    hook: Option<BuilderHook>,
    interrupt: Interrupt,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("argv", &self.argv)
            .field("workdir", &self.workdir)
            .field("target_exit_code", &self.target_exit_code)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl CommandSpec {
    /// Fails with `ShellError::EmptyCommand` if `argv` is empty.
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.is_empty() {
            anyhow::bail!(ShellError::EmptyCommand);
        }
        Ok(Self {
            argv,
            workdir: None,
            target_exit_code: 0,
            hook: None,
            interrupt: Interrupt::new(),
        })
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn with_target_exit_code(mut self, code: i32) -> Self {
        self.target_exit_code = code;
        self
    }

    /// Installs a customisation hook. Any hook set earlier runs first.
    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&mut Command) -> Result<()> + Send + 'static,
    {
        let combined: BuilderHook = match self.hook.take() {
            None => Box::new(hook),
            Some(previous) => Box::new(move |cmd: &mut Command| {
                previous(cmd)?;
                hook(cmd)
            }),
        };
        self.hook = Some(combined);
        self
    }

    /// Adds environment variables through the customisation hook.
    pub fn with_env(self, vars: Vec<(String, String)>) -> Self {
        if vars.is_empty() {
            return self;
        }
        self.with_hook(move |cmd| {
            cmd.envs(vars);
            Ok(())
        })
    }

    /// Uses `interrupt` instead of a private flag, so the caller can cancel.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Inserts `prefix` in front of the command.
    pub fn elevated(mut self, prefix: &[String]) -> Self {
        self.argv.splice(0..0, prefix.iter().cloned());
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn target_exit_code(&self) -> i32 {
        self.target_exit_code
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// The argument vector joined for display.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

/// Starts processes and drives them to completion.
#[derive(Clone)]
pub struct ProcessLauncher {
    sink: SharedSink,
    coordinator: CompletionCoordinator,
    default_workdir: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(sink: SharedSink, poll: Duration) -> Self {
        Self {
            coordinator: CompletionCoordinator::new(Arc::clone(&sink), poll),
            sink,
            default_workdir: None,
        }
    }

    /// Directory used for specs that do not name one.
    pub fn with_default_workdir(mut self, dir: Option<PathBuf>) -> Self {
        self.default_workdir = dir;
        self
    }

    /// # Launch (`launch`)
    ///
    /// Starts the process and its two output collectors.
    ///
    /// Returns `None` if the process could not be started; the observer has
    /// already been told why. Dropping the returned handle kills and reaps
    /// the child.
    #[instrument(skip_all, fields(command = %spec.command_line()))]
    pub fn launch(
        &self,
        spec: CommandSpec,
        observer: SharedObserver,
        tasks: SharedTaskObserver,
    ) -> Option<LaunchedProcess> {
        if observer.needs_command_logging() {
            observer.on_shell_output(OutputRole::Cmd, &spec.command_line());
        }

        let CommandSpec {
            argv,
            workdir,
            hook,
            interrupt,
            ..
        } = spec;
        // CommandSpec::new guarantees at least one token.
        let Some((program, args)) = argv.split_first() else {
            let cause = anyhow!(ShellError::EmptyCommand);
            self.report_start_failure(observer.as_ref(), &cause);
            return None;
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = workdir.or_else(|| self.default_workdir.clone()) {
            match self.usable_workdir(&dir) {
                Some(dir) => {
                    command.current_dir(dir);
                }
                None => self.sink.log(
                    LogLevel::Warn,
                    &format!(
                        "Working directory '{}' does not exist or is not a directory, using the current directory",
                        dir.display()
                    ),
                    None,
                ),
            }
        }

        if let Some(hook) = hook {
            if let Err(e) = hook(&mut command) {
                let cause = e.context(format!("Customisation hook for '{}' failed", program));
                self.report_start_failure(observer.as_ref(), &cause);
                return None;
            }
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let cause = anyhow::Error::new(e).context(format!("Failed to start '{}'", program));
                self.report_start_failure(observer.as_ref(), &cause);
                return None;
            }
        };
        debug!("Started process {} ({})", child.id(), program);
        observer.on_process_started();

        let barrier = CompletionBarrier::for_streams();
        let streams: [(StreamRole, Option<Box<dyn std::io::Read + Send>>); 2] = [
            (
                StreamRole::Out,
                child.stdout.take().map(|s| Box::new(s) as Box<dyn std::io::Read + Send>),
            ),
            (
                StreamRole::Err,
                child.stderr.take().map(|s| Box::new(s) as Box<dyn std::io::Read + Send>),
            ),
        ];
        for (role, stream) in streams {
            let Some(stream) = stream else {
                // The hook redirected this stream away; nothing to drain.
                debug!("{:?} is not piped, skipping its collector", role);
                barrier.count_down();
                continue;
            };
            let spawned = OutputCollector::new(
                stream,
                role,
                Arc::clone(&barrier),
                interrupt.clone(),
                Arc::clone(&self.sink),
            )
            .with_line_observer(Arc::clone(&observer))
            .with_task_observer(Arc::clone(&tasks))
            .spawn();
            if let Err(e) = spawned {
                self.sink.log(
                    LogLevel::Error,
                    &format!("Could not start {:?} collector thread", role),
                    Some(&e),
                );
            }
        }

        Some(LaunchedProcess {
            child,
            barrier,
            interrupt,
        })
    }

    /// # Run Asynchronously (`run_async`)
    ///
    /// Returns whether the process started.
    pub fn run_async(
        &self,
        spec: CommandSpec,
        observer: SharedObserver,
        tasks: SharedTaskObserver,
    ) -> bool {
        match self.launch(spec, Arc::clone(&observer), Arc::clone(&tasks)) {
            Some(process) => {
                debug!("Process {} handed to background completion", process.id());
                BackgroundCompletion.drive(&self.coordinator, process, observer, tasks);
                true
            }
            None => false,
        }
    }

    /// # Run Synchronously (`run_sync`)
    ///
    /// Blocks until the command has terminated.
    ///
    /// Start failures are returned as a completed result with
    /// `ExitCode::NotStarted`; nothing here returns an error.
    pub fn run_sync(
        &self,
        spec: CommandSpec,
        observer: SharedObserver,
        tasks: SharedTaskObserver,
    ) -> CommandResult {
        let recorder = Arc::new(RecordingObserver::new(observer, spec.target_exit_code()));
        let shared: SharedObserver = recorder.clone();
        // Nothing else completes this process, so it cannot have finished yet.
        if let Some(process) = self.launch(spec, Arc::clone(&shared), Arc::clone(&tasks)) {
            InlineCompletion.drive(&self.coordinator, process, shared, tasks);
        }
        recorder.result()
    }

    fn usable_workdir<'a>(&self, dir: &'a Path) -> Option<&'a Path> {
        dir.is_dir().then_some(dir)
    }

    fn report_start_failure(&self, observer: &dyn ProcessObserver, cause: &anyhow::Error) {
        let source: &(dyn Error + 'static) = cause.as_ref();
        self.sink
            .log(LogLevel::Error, &format!("{:#}", cause), Some(source));
        observer.on_process_start_failed(cause);
    }
}

/// Decorator used by `run_sync`: records every line and the outcome, then
/// forwards each event to the caller's observer.
struct RecordingObserver {
    inner: SharedObserver,
    live: LiveResult,
    started: AtomicBool,
}

impl RecordingObserver {
    fn new(inner: SharedObserver, target_exit_code: i32) -> Self {
        Self {
            inner,
            live: LiveResult::new(target_exit_code),
            started: AtomicBool::new(false),
        }
    }

    fn result(&self) -> CommandResult {
        if !self.started.load(Ordering::SeqCst) {
            // Covers a launch that returned without reporting either way.
            self.live.complete(ExitCode::NotStarted);
        }
        self.live.snapshot()
    }
}

impl ProcessObserver for RecordingObserver {
    fn needs_command_logging(&self) -> bool {
        self.inner.needs_command_logging()
    }

    fn on_shell_output(&self, role: OutputRole, line: &str) {
        match role {
            OutputRole::Out => {
                self.live.push_line(StreamRole::Out, line);
            }
            OutputRole::Err => {
                self.live.push_line(StreamRole::Err, line);
            }
            OutputRole::Cmd => {}
        }
        self.inner.on_shell_output(role, line);
    }

    fn on_process_started(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.inner.on_process_started();
    }

    fn on_process_start_failed(&self, cause: &anyhow::Error) {
        self.live.complete(ExitCode::NotStarted);
        self.inner.on_process_start_failed(cause);
    }

    fn on_process_complete(&self, exit_code: ExitCode) {
        self.live.complete(exit_code);
        self.inner.on_process_complete(exit_code);
    }
}
