//! Retry counters
//!
//! Counters use Relaxed ordering: they are observational only and do not
//! synchronize any other memory.

use std::sync::atomic::{AtomicU64, Ordering};

/// Why an invocation handed a conflict back instead of retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Error is not a transient conflict
    Terminal,
    /// Retry budget used up
    Exhausted,
    /// Nested inside another retry-managed invocation or open transaction
    Deferred,
    /// Cancellation token fired
    Cancelled,
}

#[derive(Debug, Default)]
pub(crate) struct RetryCounters {
    invocations: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    terminal: AtomicU64,
    exhausted: AtomicU64,
    deferred: AtomicU64,
    cancelled: AtomicU64,
}

impl RetryCounters {
    pub(crate) fn record_invocation(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_propagation(&self, reason: Propagation) {
        let counter = match reason {
            Propagation::Terminal => &self.terminal,
            Propagation::Exhausted => &self.exhausted,
            Propagation::Deferred => &self.deferred,
            Propagation::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RetryMetrics {
        RetryMetrics {
            invocations: self.invocations.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            terminal: self.terminal.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of a coordinator's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryMetrics {
    /// Coordinator invocations started
    pub invocations: u64,
    /// Operation executions, first attempts included
    pub attempts: u64,
    /// Retries scheduled
    pub retries: u64,
    /// Invocations ended by a non-retryable error
    pub terminal: u64,
    /// Invocations ended by an exhausted retry budget
    pub exhausted: u64,
    /// Conflicts handed to an enclosing invocation
    pub deferred: u64,
    /// Invocations stopped by cancellation
    pub cancelled: u64,
}

impl RetryMetrics {
    /// Invocations that ended in an error
    pub fn failures(&self) -> u64 {
        self.terminal + self.exhausted + self.deferred + self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = RetryCounters::default();
        counters.record_invocation();
        counters.record_attempt();
        counters.record_attempt();
        counters.record_retry();
        counters.record_propagation(Propagation::Exhausted);
        counters.record_propagation(Propagation::Deferred);

        let metrics = counters.snapshot();
        assert_eq!(metrics.invocations, 1);
        assert_eq!(metrics.attempts, 2);
        assert_eq!(metrics.retries, 1);
        assert_eq!(metrics.exhausted, 1);
        assert_eq!(metrics.deferred, 1);
        assert_eq!(metrics.failures(), 2);
    }
}
