//! # Shellrun Logging Sink
//!
//! File: cli/src/core/logging.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! The process runner never calls a global logger directly for the events it
//! reports to its owner (start failures, interrupted waits, working-directory
//! fallbacks, broken streams). Instead each component receives a `LogSink`
//! at construction. Production code uses `TracingSink`, which forwards to the
//! `tracing` macros; tests use `MemorySink` to assert on what was reported.
//!
//! Logging is fire-and-forget: `log` returns nothing and cannot fail.
//!
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Severity of a sink entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Injected logging capability.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>);
}

/// Shared handle to a sink, cloned into every task of a command.
pub type SharedSink = Arc<dyn LogSink>;

/// Forwards entries to the `tracing` subscriber installed in `main`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>) {
        match (level, cause) {
            (LogLevel::Debug, None) => debug!("{}", message),
            (LogLevel::Debug, Some(c)) => debug!(cause = %c, "{}", message),
            (LogLevel::Info, None) => info!("{}", message),
            (LogLevel::Info, Some(c)) => info!(cause = %c, "{}", message),
            (LogLevel::Warn, None) => warn!("{}", message),
            (LogLevel::Warn, Some(c)) => warn!(cause = %c, "{}", message),
            (LogLevel::Error, None) => error!("{}", message),
            (LogLevel::Error, Some(c)) => error!(cause = %c, "{}", message),
        }
    }
}

/// Returns the default production sink.
pub fn tracing_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// A single captured entry from `MemorySink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub cause: Option<String>,
}

/// Sink that keeps every entry in memory. Used by tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of everything logged so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// True if any entry at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str, cause: Option<&(dyn Error + 'static)>) {
        let entry = LogEntry {
            level,
            message: message.to_string(),
            cause: cause.map(|c| c.to_string()),
        };
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        // Mirror to tracing so `RUST_LOG` still shows test output.
        TracingSink.log(level, message, cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_memory_sink_records_cause() {
        let sink = MemorySink::new();
        let cause = io::Error::new(io::ErrorKind::NotFound, "no such file");
        sink.log(LogLevel::Error, "failed to start", Some(&cause));
        sink.log(LogLevel::Warn, "falling back", None);

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cause.as_deref(), Some("no such file"));
        assert!(sink.contains(LogLevel::Warn, "falling"));
        assert!(!sink.contains(LogLevel::Error, "falling"));
    }

    #[test]
    fn test_level_display() {
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }
}
