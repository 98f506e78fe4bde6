//! # Completion Coordinator (`common::process::coordinator`)
//!
//! File: cli/src/common/process/coordinator.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The coordinator decides how a started command ended. It runs the same
//! sequence whichever thread drives it:
//!
//! 1. Wait on the `CompletionBarrier` until both output collectors are done.
//! 2. Only then wait for the child to terminate.
//! 3. Kill and reap the child handle, on every path.
//! 4. Report the `ExitCode` to the observer, exactly once.
//!
//! The order of steps 1 and 2 is what keeps a chatty child from blocking
//! forever on a full pipe while its parent sits in `wait`.
//!
//! ## Drivers
//!
//! `CompletionDriver` abstracts *where* the sequence runs:
//! - `InlineCompletion` runs it on the calling thread (synchronous mode).
//! - `BackgroundCompletion` runs it on a dedicated `shellrun-completion` thread
//!   (asynchronous mode) and reports only through the observer.
//!
use super::barrier::{CompletionBarrier, Interrupt};
use super::observer::{ProcessObserver, SharedObserver, SharedTaskObserver, TaskRole};
use super::result::ExitCode;
use crate::core::logging::{LogLevel, SharedSink};
use std::io;
use std::process::Child;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// A running child whose output collectors have been started.
#[derive(Debug)]
pub struct LaunchedProcess {
    pub(crate) child: Child,
    pub(crate) barrier: Arc<CompletionBarrier>,
    pub(crate) interrupt: Interrupt,
}

impl LaunchedProcess {
    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

/// A handle that is dropped without going through `CompletionCoordinator::finish`
/// still kills and reaps its child.
impl Drop for LaunchedProcess {
    fn drop(&mut self) {
        destroy(&mut self.child);
    }
}

/// Runs the drain-wait-destroy-report sequence.
#[derive(Clone)]
pub struct CompletionCoordinator {
    sink: SharedSink,
    poll: Duration,
}

impl CompletionCoordinator {
    pub fn new(sink: SharedSink, poll: Duration) -> Self {
        Self { sink, poll }
    }

    pub fn finish(&self, mut process: LaunchedProcess, observer: &dyn ProcessObserver) -> ExitCode {
        let drained = process.barrier.remaining() == 0
            || process.barrier.wait(&process.interrupt, self.poll).is_ok();
        let exit_code = if drained {
            self.wait_for_exit(&mut process.child, &process.interrupt)
        } else {
            self.sink.log(
                LogLevel::Warn,
                &format!(
                    "Interrupted while waiting for output of process {} to drain",
                    process.id()
                ),
                None,
            );
            ExitCode::Interrupted
        };

        // Dropping the handle kills and reaps the child.
        drop(process);
        observer.on_process_complete(exit_code);
        exit_code
    }

    fn wait_for_exit(&self, child: &mut Child, interrupt: &Interrupt) -> ExitCode {
        loop {
            if interrupt.is_raised() {
                self.sink.log(
                    LogLevel::Warn,
                    &format!("Interrupted while waiting for process {} to exit", child.id()),
                    None,
                );
                return ExitCode::Interrupted;
            }
            match child.wait_timeout(self.poll) {
                Ok(Some(status)) => return ExitCode::from_status(status),
                Ok(None) => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.sink.log(
                        LogLevel::Error,
                        &format!("Failed waiting for process {}", child.id()),
                        Some(&e),
                    );
                    return ExitCode::Interrupted;
                }
            }
        }
    }
}

/// Kills the child if it is still running and reaps it.
fn destroy(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("kill({}) returned: {}", child.id(), e);
    }
    if let Err(e) = child.wait() {
        debug!("reaping {} failed: {}", child.id(), e);
    }
}

/// Where the coordinator sequence runs.
pub trait CompletionDriver {
    /// Returns the exit code when it is known on return, `None` when it will
    /// arrive later through `ProcessObserver::on_process_complete`.
    fn drive(
        &self,
        coordinator: &CompletionCoordinator,
        process: LaunchedProcess,
        observer: SharedObserver,
        tasks: SharedTaskObserver,
    ) -> Option<ExitCode>;
}

/// Runs the coordinator on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineCompletion;

impl CompletionDriver for InlineCompletion {
    fn drive(
        &self,
        coordinator: &CompletionCoordinator,
        process: LaunchedProcess,
        observer: SharedObserver,
        _tasks: SharedTaskObserver,
    ) -> Option<ExitCode> {
        Some(coordinator.finish(process, observer.as_ref()))
    }
}

/// Runs the coordinator on its own thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundCompletion;

impl CompletionDriver for BackgroundCompletion {
    fn drive(
        &self,
        coordinator: &CompletionCoordinator,
        process: LaunchedProcess,
        observer: SharedObserver,
        tasks: SharedTaskObserver,
    ) -> Option<ExitCode> {
        // The slot lets this thread take the process back if the spawn fails.
        let slot = Arc::new(Mutex::new(Some(process)));
        let spawned = {
            let slot = Arc::clone(&slot);
            let coordinator = coordinator.clone();
            let observer = Arc::clone(&observer);
            let tasks = Arc::clone(&tasks);
            thread::Builder::new()
                .name(TaskRole::Completion.thread_name().to_string())
                .spawn(move || {
                    let process = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
                    if let Some(process) = process {
                        tasks.on_task_started(
                            TaskRole::Completion,
                            TaskRole::Completion.thread_name(),
                        );
                        coordinator.finish(process, observer.as_ref());
                        tasks.on_task_finished(TaskRole::Completion);
                    }
                })
        };

        if let Err(e) = spawned {
            coordinator.sink.log(
                LogLevel::Error,
                "Could not start completion thread, completing on the caller",
                Some(&e),
            );
            let process = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(process) = process {
                return Some(coordinator.finish(process, observer.as_ref()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::process::observer::{NoTaskTracking, OutputRole};
    use crate::core::logging::MemorySink;
    use std::process::{Command, Stdio};
    use std::sync::mpsc;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(10);

    struct ExitSender(Mutex<mpsc::Sender<ExitCode>>);

    impl ProcessObserver for ExitSender {
        fn needs_command_logging(&self) -> bool {
            false
        }
        fn on_shell_output(&self, _role: OutputRole, _line: &str) {}
        fn on_process_started(&self) {}
        fn on_process_start_failed(&self, _cause: &anyhow::Error) {}
        fn on_process_complete(&self, exit_code: ExitCode) {
            let _ = self.0.lock().unwrap().send(exit_code);
        }
    }

    fn spawn_sh(script: &str, barrier: Arc<CompletionBarrier>, interrupt: Interrupt) -> LaunchedProcess {
        let child = Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("sh should start");
        LaunchedProcess {
            child,
            barrier,
            interrupt,
        }
    }

    #[test]
    fn test_inline_reports_real_exit_code() {
        let barrier = CompletionBarrier::for_streams();
        barrier.count_down();
        barrier.count_down();
        let process = spawn_sh("exit 7", barrier, Interrupt::new());
        let (tx, rx) = mpsc::channel();
        let observer: SharedObserver = Arc::new(ExitSender(Mutex::new(tx)));
        let coordinator = CompletionCoordinator::new(MemorySink::new(), POLL);

        let exit = InlineCompletion.drive(&coordinator, process, observer, Arc::new(NoTaskTracking));
        assert_eq!(exit, Some(ExitCode::Exited(7)));
        assert_eq!(rx.recv().unwrap(), ExitCode::Exited(7));
        assert!(rx.try_recv().is_err(), "completion reported exactly once");
    }

    #[test]
    fn test_does_not_wait_for_exit_before_streams_drain() {
        let barrier = CompletionBarrier::for_streams();
        let process = spawn_sh("exit 0", Arc::clone(&barrier), Interrupt::new());
        let (tx, rx) = mpsc::channel();
        let observer: SharedObserver = Arc::new(ExitSender(Mutex::new(tx)));
        let coordinator = CompletionCoordinator::new(MemorySink::new(), POLL);

        let exit = BackgroundCompletion.drive(&coordinator, process, observer, Arc::new(NoTaskTracking));
        assert_eq!(exit, None);
        // The child is long gone, but nothing is reported while a stream is open.
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        barrier.count_down();
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        barrier.count_down();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            ExitCode::Exited(0)
        );
    }

    #[test]
    fn test_interrupt_during_exit_wait_kills_child() {
        let barrier = Arc::new(CompletionBarrier::new(0));
        let interrupt = Interrupt::new();
        let process = spawn_sh("sleep 30", barrier, interrupt.clone());
        let (tx, rx) = mpsc::channel();
        let observer: SharedObserver = Arc::new(ExitSender(Mutex::new(tx)));
        let sink = MemorySink::new();
        let coordinator = CompletionCoordinator::new(sink.clone(), POLL);

        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            interrupt.raise();
        });
        let start = Instant::now();
        let exit = InlineCompletion.drive(&coordinator, process, observer, Arc::new(NoTaskTracking));
        raiser.join().unwrap();

        assert_eq!(exit, Some(ExitCode::Interrupted));
        assert_eq!(rx.recv().unwrap(), ExitCode::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(sink.contains(LogLevel::Warn, "to exit"));
    }

    #[cfg(unix)]
    #[test]
    fn test_dropped_handle_kills_and_reaps_child() {
        let process = spawn_sh("sleep 30", CompletionBarrier::for_streams(), Interrupt::new());
        let pid = process.id().to_string();
        drop(process);

        // An unreaped zombie would still answer `kill -0`.
        let alive = Command::new("kill")
            .args(["-0", &pid])
            .stderr(Stdio::null())
            .status()
            .expect("kill should run");
        assert!(!alive.success(), "process {} outlived its handle", pid);
    }

    #[test]
    fn test_interrupt_during_drain_wait_still_reports() {
        let barrier = CompletionBarrier::for_streams();
        let interrupt = Interrupt::new();
        interrupt.raise();
        let process = spawn_sh("sleep 30", barrier, interrupt);
        let (tx, rx) = mpsc::channel();
        let observer: SharedObserver = Arc::new(ExitSender(Mutex::new(tx)));
        let sink = MemorySink::new();
        let coordinator = CompletionCoordinator::new(sink.clone(), POLL);

        let exit = InlineCompletion.drive(&coordinator, process, observer, Arc::new(NoTaskTracking));
        assert_eq!(exit, Some(ExitCode::Interrupted));
        assert_eq!(rx.recv().unwrap(), ExitCode::Interrupted);
        assert!(sink.contains(LogLevel::Warn, "to drain"));
    }
}
