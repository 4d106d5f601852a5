//! Retry observation
//!
//! One warning per scheduled retry, never for the final failure.

use std::time::Duration;
use tracing::warn;
use txretry_core::ErrorKind;

/// A scheduled retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based retry number
    pub number: usize,
    /// Pause before the retry (possibly fuzzed, zero means none)
    pub wait: Duration,
    /// Kind of the conflict that triggered it
    pub kind: ErrorKind,
}

impl Attempt {
    /// English ordinal suffix for [`Attempt::number`]
    pub fn ordinal_suffix(&self) -> &'static str {
        ordinal_suffix(self.number)
    }

    /// Log line for this retry
    pub fn message(&self) -> String {
        format!(
            "{} detected. Retrying for the {}-{} time...",
            self.kind.label(),
            self.number,
            self.ordinal_suffix()
        )
    }
}

/// `st`, `nd`, `rd` for 1, 2, 3 and `th` for everything else
pub fn ordinal_suffix(n: usize) -> &'static str {
    match n {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Receives one call per scheduled retry
pub trait RetryLogger: Send + Sync {
    /// Called before pausing for `attempt`
    fn warn(&self, attempt: &Attempt, message: &str);
}

/// Default logger: emits a `tracing` warning on target `txretry::retry`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RetryLogger for TracingLogger {
    fn warn(&self, attempt: &Attempt, message: &str) {
        warn!(
            target: "txretry::retry",
            attempt = attempt.number,
            kind = %attempt.kind,
            wait_ms = attempt.wait.as_millis() as u64,
            "{}",
            message
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_suffix() {
        let suffixes: Vec<_> = (1..=5).map(ordinal_suffix).collect();
        assert_eq!(suffixes, vec!["st", "nd", "rd", "th", "th"]);
        assert_eq!(ordinal_suffix(21), "th");
    }

    #[test]
    fn test_message_for_builtin_conflict() {
        let attempt = Attempt {
            number: 2,
            wait: Duration::from_secs(1),
            kind: ErrorKind::ISOLATION_CONFLICT,
        };
        assert_eq!(
            attempt.message(),
            "Transaction isolation conflict detected. Retrying for the 2-nd time..."
        );
    }

    #[test]
    fn test_message_for_registered_kind() {
        let attempt = Attempt {
            number: 1,
            wait: Duration::ZERO,
            kind: ErrorKind::from("lock_timeout"),
        };
        assert_eq!(
            attempt.message(),
            "lock_timeout detected. Retrying for the 1-st time..."
        );
    }
}
