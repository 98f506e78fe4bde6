//! # Completion Barrier and Interrupt Flag (`common::process::barrier`)
//!
//! File: cli/src/common/process/barrier.rs
//! Author: Christi Mahu
//!
//! ## Overview
//!
//! `CompletionBarrier` is a countdown latch created once per command with one
//! count per output stream. Each output collector counts it down when its
//! stream ends. Any number of threads may wait on it; they are all released
//! when the count reaches zero, and a wait that starts after that point
//! returns immediately.
//!
//! `Interrupt` is the cancellation handle shared by one command's tasks.
//! Raising it makes every blocked wait give up at its next poll. The flag is
//! never lowered again, so once a wait has observed it every later wait on the
//! same command observes it too.
//!
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Returned by a wait that gave up because its interrupt was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait was interrupted")]
pub struct Interrupted;

/// Shared, sticky cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// # New Interrupt (`new`)
    ///
    /// A fresh, lowered flag. Clones share the same flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// # Raise (`raise`)
    ///
    /// Raises the flag for every clone. It stays raised.
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether `raise` has been called on any clone.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Countdown latch released once every output stream has drained.
#[derive(Debug)]
pub struct CompletionBarrier {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionBarrier {
    /// One count for standard output, one for standard error.
    pub const STREAM_COUNT: usize = 2;

    /// A latch that opens after `count` calls to `count_down`.
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    pub fn for_streams() -> Arc<Self> {
        Arc::new(Self::new(Self::STREAM_COUNT))
    }

    /// Decrements the count, saturating at zero.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.released.notify_all();
            }
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Blocks until the count reaches zero or `interrupt` is raised.
    ///
    /// The interrupt is checked every `poll`.
    pub fn wait(&self, interrupt: &Interrupt, poll: Duration) -> Result<(), Interrupted> {
        let mut remaining = self.remaining.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if *remaining == 0 {
                return Ok(());
            }
            if interrupt.is_raised() {
                return Err(Interrupted);
            }
            remaining = self
                .released
                .wait_timeout(remaining, poll)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }
}
