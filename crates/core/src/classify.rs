//! Conflict classification
//!
//! Decides whether an error raised by a wrapped operation is a transient
//! conflict worth re-running, or a terminal error to hand back to the caller.

use crate::kind::{ErrorKind, TransactionError};
use std::collections::HashSet;

/// Outcome of classifying an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Transient conflict: the operation may succeed if re-run
    Retryable,
    /// Any other failure: propagate immediately
    Terminal,
}

impl Classification {
    /// Whether this is [`Classification::Retryable`]
    pub fn is_retryable(self) -> bool {
        matches!(self, Classification::Retryable)
    }
}

/// Caller-registered error kinds treated as transient conflicts
///
/// The built-in isolation conflict is always retryable and does not need to
/// be listed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryableKinds {
    kinds: HashSet<ErrorKind>,
}

impl RetryableKinds {
    /// Empty set (only the built-in conflict is retryable)
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, kind: impl Into<ErrorKind>) -> Self {
        self.insert(kind);
        self
    }

    /// Register a kind; returns false if it was already present
    pub fn insert(&mut self, kind: impl Into<ErrorKind>) -> bool {
        self.kinds.insert(kind.into())
    }

    /// Whether `kind` was registered
    pub fn contains(&self, kind: &ErrorKind) -> bool {
        self.kinds.contains(kind)
    }

    /// Number of registered kinds
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether no kinds were registered
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Iterate over registered kinds (unordered)
    pub fn iter(&self) -> impl Iterator<Item = &ErrorKind> {
        self.kinds.iter()
    }
}

impl<K: Into<ErrorKind>> FromIterator<K> for RetryableKinds {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            kinds: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<K: Into<ErrorKind>> Extend<K> for RetryableKinds {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.kinds.extend(iter.into_iter().map(Into::into));
    }
}

/// Classify a kind against the built-in conflict and `extra` kinds
pub fn classify_kind(kind: &ErrorKind, extra: &RetryableKinds) -> Classification {
    if *kind == ErrorKind::CANCELLED {
        return Classification::Terminal;
    }
    if *kind == ErrorKind::ISOLATION_CONFLICT || extra.contains(kind) {
        Classification::Retryable
    } else {
        Classification::Terminal
    }
}

/// Classify an error raised by a wrapped operation
///
/// Borrows the error so the caller can still return it unchanged.
pub fn classify<E>(error: &E, extra: &RetryableKinds) -> Classification
where
    E: TransactionError + ?Sized,
{
    classify_kind(&error.kind(), extra)
}
