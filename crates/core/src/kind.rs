//! Error kinds reported by a transaction engine
//!
//! The retry layer never inspects error values beyond their kind. Any error
//! type flowing out of a wrapped operation implements [`TransactionError`] so
//! the classifier can read its [`ErrorKind`] without consuming or wrapping it.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Identifier for a class of transaction engine errors
///
/// Kinds are plain strings so that callers can register driver-specific
/// kinds (`"deadlock_detected"`, `"lock_timeout"`, ...) without touching this
/// crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorKind(Cow<'static, str>);

impl ErrorKind {
    /// Built-in kind for a transaction isolation/serialization conflict
    pub const ISOLATION_CONFLICT: ErrorKind =
        ErrorKind(Cow::Borrowed("transaction_isolation_conflict"));

    /// Built-in kind for an operation aborted through cancellation
    ///
    /// Never retryable, even when a caller registers it.
    pub const CANCELLED: ErrorKind = ErrorKind(Cow::Borrowed("cancelled"));

    /// Kind for a statically known identifier
    pub const fn from_static(name: &'static str) -> Self {
        ErrorKind(Cow::Borrowed(name))
    }

    /// Kind for an identifier built at runtime (e.g. loaded from config)
    pub fn new(name: impl Into<String>) -> Self {
        ErrorKind(Cow::Owned(name.into()))
    }

    /// The identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human readable label used in retry log lines
    pub fn label(&self) -> &str {
        if *self == Self::ISOLATION_CONFLICT {
            "Transaction isolation conflict"
        } else {
            self.as_str()
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&'static str> for ErrorKind {
    fn from(name: &'static str) -> Self {
        ErrorKind::from_static(name)
    }
}

impl From<String> for ErrorKind {
    fn from(name: String) -> Self {
        ErrorKind::new(name)
    }
}

/// An error produced by a transactional operation
///
/// Implement this for the error type of your driver or ORM layer.
pub trait TransactionError {
    /// Kind tag used for retry classification
    fn kind(&self) -> ErrorKind;

    /// Whether this is the engine's built-in isolation conflict
    fn is_isolation_conflict(&self) -> bool {
        self.kind() == ErrorKind::ISOLATION_CONFLICT
    }
}

impl<E: TransactionError + ?Sized> TransactionError for Box<E> {
    fn kind(&self) -> ErrorKind {
        (**self).kind()
    }
}

/// Ready-made error type for engines without one of their own
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxnError {
    /// Serialization failure or other isolation conflict
    #[error("transaction isolation conflict: {0}")]
    IsolationConflict(String),

    /// Database error carrying a driver-specific kind
    #[error("{kind}: {message}")]
    Database {
        /// Driver-specific kind (deadlock, lock timeout, ...)
        kind: ErrorKind,
        /// Driver message
        message: String,
    },

    /// Operation aborted because its cancellation token fired
    #[error("transaction cancelled")]
    Cancelled,

    /// Error raised by application code inside the transaction
    #[error("application error: {0}")]
    Application(String),
}

impl TxnError {
    /// Construct an isolation conflict
    pub fn conflict(message: impl Into<String>) -> Self {
        TxnError::IsolationConflict(message.into())
    }

    /// Construct a database error of the given kind
    pub fn database(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        TxnError::Database {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Construct an application error
    pub fn application(message: impl Into<String>) -> Self {
        TxnError::Application(message.into())
    }
}

impl TransactionError for TxnError {
    fn kind(&self) -> ErrorKind {
        match self {
            TxnError::IsolationConflict(_) => ErrorKind::ISOLATION_CONFLICT,
            TxnError::Database { kind, .. } => kind.clone(),
            TxnError::Cancelled => ErrorKind::CANCELLED,
            TxnError::Application(_) => ErrorKind::from_static("application"),
        }
    }
}
