//! # Output Collector (`common::process::collector`)
//!
//! File: cli/src/common/process/collector.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! An `OutputCollector` drains one pipe of a child process on its own thread.
//! It reads line by line until end-of-stream, an I/O error, or the command's
//! interrupt is raised, handing each line to the `ProcessObserver`.
//!
//! Whatever ends the loop, the collector reports itself finished to the
//! `TaskObserver` and then counts the `CompletionBarrier` down. The barrier is
//! therefore always released once both collectors are gone, and every
//! task-finished notification has been delivered before anyone waiting on the
//! barrier wakes up.
//!
//! Bytes that are not valid UTF-8 are decoded lossily; a trailing `\n` or
//! `\r\n` is stripped from each line.
//!
use super::barrier::{CompletionBarrier, Interrupt};
use super::observer::{SharedObserver, SharedTaskObserver, StreamRole, TaskRole};
use crate::core::logging::{LogLevel, SharedSink};
use std::io::{self, BufRead, BufReader, Read};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct OutputCollector<R> {
    stream: R,
    role: StreamRole,
    lines: Option<SharedObserver>,
    tasks: Option<SharedTaskObserver>,
    barrier: Arc<CompletionBarrier>,
    interrupt: Interrupt,
    sink: SharedSink,
}

impl<R: Read + Send + 'static> OutputCollector<R> {
    pub fn new(
        stream: R,
        role: StreamRole,
        barrier: Arc<CompletionBarrier>,
        interrupt: Interrupt,
        sink: SharedSink,
    ) -> Self {
        Self {
            stream,
            role,
            lines: None,
            tasks: None,
            barrier,
            interrupt,
            sink,
        }
    }

    pub fn with_line_observer(mut self, observer: SharedObserver) -> Self {
        self.lines = Some(observer);
        self
    }

    pub fn with_task_observer(mut self, observer: SharedTaskObserver) -> Self {
        self.tasks = Some(observer);
        self
    }

    /// Starts the collector on a named thread.
    ///
    /// If the thread cannot be created the barrier is counted down here so
    /// that waiters are not left hanging on a reader that never ran.
    pub fn spawn(self) -> io::Result<JoinHandle<usize>> {
        let barrier = Arc::clone(&self.barrier);
        let role = self.role;
        let spawned = thread::Builder::new()
            .name(TaskRole::from(role).thread_name().to_string())
            .spawn(move || self.run());
        if spawned.is_err() {
            barrier.count_down();
        }
        spawned
    }

    /// Drains the stream on the current thread. Returns the number of lines read.
    pub fn run(self) -> usize {
        let task_role = TaskRole::from(self.role);
        if let Some(tasks) = &self.tasks {
            let current = thread::current();
            tasks.on_task_started(task_role, current.name().unwrap_or(task_role.thread_name()));
        }

        let mut reader = BufReader::new(self.stream);
        let mut buf = Vec::new();
        let mut count = 0;
        loop {
            if self.interrupt.is_raised() {
                self.sink.log(
                    LogLevel::Debug,
                    &format!("{:?} collector stopping: command interrupted", self.role),
                    None,
                );
                break;
            }
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    if let Some(observer) = &self.lines {
                        observer.on_shell_output(self.role.into(), &line);
                    }
                    count += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.sink.log(
                        LogLevel::Warn,
                        &format!("Error reading {:?} stream, closing it", self.role),
                        Some(&e),
                    );
                    break;
                }
            }
        }

        if let Some(tasks) = &self.tasks {
            tasks.on_task_finished(task_role);
        }
        self.barrier.count_down();
        count
    }
}

fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if end > 0 && raw[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::process::observer::{OutputRole, ProcessObserver};
    use crate::common::process::result::ExitCode;
    use crate::core::logging::MemorySink;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<(OutputRole, String)>>);

    impl ProcessObserver for Lines {
        fn needs_command_logging(&self) -> bool {
            false
        }
        fn on_shell_output(&self, role: OutputRole, line: &str) {
            self.0.lock().unwrap().push((role, line.to_string()));
        }
        fn on_process_started(&self) {}
        fn on_process_start_failed(&self, _cause: &anyhow::Error) {}
        fn on_process_complete(&self, _exit_code: ExitCode) {}
    }

    #[derive(Default)]
    struct Tasks(Mutex<Vec<String>>);

    impl crate::common::process::observer::TaskObserver for Tasks {
        fn on_task_started(&self, role: TaskRole, _thread_name: &str) {
            self.0.lock().unwrap().push(format!("start {:?}", role));
        }
        fn on_task_finished(&self, role: TaskRole) {
            self.0.lock().unwrap().push(format!("finish {:?}", role));
        }
    }

    /// Yields some bytes, then fails.
    struct Flaky {
        sent: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe went away"));
            }
            self.sent = true;
            let data = b"partial\n";
            buf[..data.len()].copy_from_slice(data);
            Ok(data.len())
        }
    }

    #[test]
    fn test_decode_line_strips_terminators() {
        assert_eq!(decode_line(b"abc\n"), "abc");
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"\xffbad\n"), "\u{fffd}bad");
    }

    #[test]
    fn test_lines_delivered_in_order_then_barrier_released() {
        let barrier = CompletionBarrier::for_streams();
        let lines = Arc::new(Lines::default());
        let tasks = Arc::new(Tasks::default());
        let collector = OutputCollector::new(
            Cursor::new(b"one\ntwo\r\nthree".to_vec()),
            StreamRole::Err,
            Arc::clone(&barrier),
            Interrupt::new(),
            MemorySink::new(),
        )
        .with_line_observer(lines.clone())
        .with_task_observer(tasks.clone());

        assert_eq!(collector.spawn().unwrap().join().unwrap(), 3);
        assert_eq!(barrier.remaining(), 1);
        let got: Vec<_> = lines.0.lock().unwrap().iter().map(|(_, l)| l.clone()).collect();
        assert_eq!(got, ["one", "two", "three"]);
        assert!(lines.0.lock().unwrap().iter().all(|(r, _)| *r == OutputRole::Err));
        assert_eq!(
            *tasks.0.lock().unwrap(),
            ["start StdErr".to_string(), "finish StdErr".to_string()]
        );
    }

    #[test]
    fn test_io_error_is_logged_and_still_counts_down() {
        let barrier = Arc::new(CompletionBarrier::new(1));
        let sink = MemorySink::new();
        let lines = Arc::new(Lines::default());
        let read = OutputCollector::new(
            Flaky { sent: false },
            StreamRole::Out,
            Arc::clone(&barrier),
            Interrupt::new(),
            sink.clone(),
        )
        .with_line_observer(lines.clone())
        .run();

        assert_eq!(read, 1);
        assert_eq!(barrier.remaining(), 0);
        assert!(sink.contains(LogLevel::Warn, "Error reading Out stream"));
        assert_eq!(lines.0.lock().unwrap()[0].1, "partial");
    }

    #[test]
    fn test_raised_interrupt_stops_reading() {
        let barrier = Arc::new(CompletionBarrier::new(1));
        let interrupt = Interrupt::new();
        interrupt.raise();
        let read = OutputCollector::new(
            Cursor::new(b"never\n".to_vec()),
            StreamRole::Out,
            Arc::clone(&barrier),
            interrupt,
            MemorySink::new(),
        )
        .run();
        assert_eq!(read, 0);
        assert_eq!(barrier.remaining(), 0);
    }
}
