//! txretry - transparent retries for transactions that hit isolation conflicts
//!
//! Wraps a transactional operation and re-runs it when the transaction engine
//! reports a transient serialization conflict (or any caller-registered error
//! kind such as a deadlock or lock timeout). Everything else passes through
//! untouched.
//!
//! # Quick Start
//!
//! ```ignore
//! use txretry::{RetryOptions, TransactionRetryExt};
//!
//! // `conn` implements `TransactionPrimitive`
//! let balance = conn.transaction_with_retry(
//!     &RetryOptions::new().retry_on("deadlock_detected"),
//!     || {
//!         let balance = conn.read_balance(42)?;
//!         conn.write_balance(42, balance + 10)?;
//!         Ok(balance + 10)
//!     },
//! )?;
//! ```
//!
//! # Architecture
//!
//! - `txretry-core`: error kinds and the conflict classifier
//! - `txretry-concurrency`: per-thread / per-task nesting depth, cancellation
//! - `txretry-engine`: backoff policy, configuration, retry coordinator
//!
//! Retries only ever happen in the outermost retry-managed invocation of an
//! execution context; inner invocations hand conflicts up so that the whole
//! block is re-run once rather than the inner part repeatedly.

pub use txretry_concurrency::{
    current_depth, CancellationToken, Cancelled, ExecutionContext, ExplicitContext, TaskContext,
    ThreadContext,
};
pub use txretry_core::{
    classify, Classification, Error, ErrorKind, Result, RetryableKinds, TransactionError, TxnError,
};
pub use txretry_engine::*;
