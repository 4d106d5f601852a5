//! Core types for txretry
//!
//! This crate defines the foundational types used by the retry layer:
//! - ErrorKind: identifier for a class of engine errors
//! - TransactionError: trait every wrapped error type implements
//! - TxnError: ready-made engine error enum
//! - Classification: conflict classifier (retryable vs terminal)
//! - Error: errors raised by the retry layer's own setup

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod error;
pub mod kind;

pub use classify::{classify, classify_kind, Classification, RetryableKinds};
pub use error::{Error, Result};
pub use kind::{ErrorKind, TransactionError, TxnError};
