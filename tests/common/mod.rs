//! Shared test utilities for the integration test suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;
use txretry::{
    Attempt, CancellationToken, Cancelled, ConnectionState, Pause, RetryCoordinator,
    RetryDefaults, RetryLogger, TransactionPrimitive, TxnError,
};

// ============================================================================
// MockConnection - in-memory transaction primitive
// ============================================================================

/// Connection that counts transactions and tracks how many are open.
///
/// Not `Sync`: each thread in a test owns its own connection.
#[derive(Default)]
pub struct MockConnection {
    open: Cell<usize>,
    begun: Cell<usize>,
    rolled_back: Cell<usize>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions begun on this connection
    pub fn begun(&self) -> usize {
        self.begun.get()
    }

    /// Transactions rolled back on this connection
    pub fn rolled_back(&self) -> usize {
        self.rolled_back.get()
    }
}

impl ConnectionState for MockConnection {
    fn has_open_transaction(&self) -> bool {
        self.open.get() > 0
    }
}

impl TransactionPrimitive for MockConnection {
    type Error = TxnError;

    fn begin_and_run<T, F>(&self, operation: F) -> Result<T, TxnError>
    where
        F: FnOnce() -> Result<T, TxnError>,
    {
        self.begun.set(self.begun.get() + 1);
        self.open.set(self.open.get() + 1);
        let result = operation();
        self.open.set(self.open.get() - 1);
        if result.is_err() {
            self.rolled_back.set(self.rolled_back.get() + 1);
        }
        result
    }
}

// ============================================================================
// Recording collaborators
// ============================================================================

/// Pause that records requested waits instead of sleeping
#[derive(Default)]
pub struct RecordingPause {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(
        &self,
        duration: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), Cancelled> {
        self.waits.lock().push(duration);
        match cancel {
            Some(token) if token.is_cancelled() => Err(Cancelled),
            _ => Ok(()),
        }
    }
}

/// Logger that keeps every retry line
#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(Attempt, String)>>,
}

impl RecordingLogger {
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.entries.lock().iter().map(|(a, _)| a.clone()).collect()
    }
}

impl RetryLogger for RecordingLogger {
    fn warn(&self, attempt: &Attempt, message: &str) {
        self.entries.lock().push((attempt.clone(), message.to_string()));
    }
}

// ============================================================================
// TestCoordinator
// ============================================================================

/// Coordinator wired to recording collaborators, fuzz disabled
pub struct TestCoordinator {
    pub coordinator: RetryCoordinator,
    pub pause: Arc<RecordingPause>,
    pub logger: Arc<RecordingLogger>,
}

impl TestCoordinator {
    pub fn new() -> Self {
        Self::with_defaults(RetryDefaults {
            fuzz: false,
            ..RetryDefaults::default()
        })
    }

    pub fn with_defaults(defaults: RetryDefaults) -> Self {
        let pause = Arc::new(RecordingPause::default());
        let logger = Arc::new(RecordingLogger::default());
        let coordinator = RetryCoordinator::new()
            .with_defaults(defaults)
            .with_pause(pause.clone())
            .with_logger(logger.clone());
        Self {
            coordinator,
            pause,
            logger,
        }
    }
}

/// Operation that fails with the scripted errors, then succeeds with the
/// number of calls made
pub fn scripted(errors: Vec<TxnError>) -> (impl FnMut() -> Result<usize, TxnError>, Arc<Mutex<usize>>) {
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let mut remaining = errors.into_iter();
    let operation = move || {
        let mut calls = counter.lock();
        *calls += 1;
        match remaining.next() {
            Some(error) => Err(error),
            None => Ok(*calls),
        }
    };
    (operation, calls)
}
