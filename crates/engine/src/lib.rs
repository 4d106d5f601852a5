//! Retry engine for txretry
//!
//! This crate orchestrates the lower layers:
//! - Backoff policy: escalating, capped, optionally fuzzed waits
//! - Configuration: process-wide defaults, per-call options, `txretry.toml`
//! - Collaborators: transaction primitive, connection state, logger, pause
//! - Retry coordinator: blocking and tokio variants, retry metrics
//!
//! The engine never begins, commits or rolls back a transaction itself; it
//! only decides whether and when to re-invoke the caller's operation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod config;
pub mod coordinator;
pub mod logger;
pub mod metrics;
pub mod pause;
pub mod primitive;

pub use backoff::{compute_wait, BackoffPolicy, FuzzSource, ThreadRngFuzz, MAX_WAIT};
pub use config::{
    global_defaults, install_defaults, RetryConfig, RetryDefaults, RetryOptions, CONFIG_FILE_NAME,
    DEFAULT_MAX_RETRIES,
};
pub use coordinator::{
    default_coordinator, run, run_async, RetryCoordinator, TransactionRetryExt,
};
pub use logger::{ordinal_suffix, Attempt, RetryLogger, TracingLogger};
pub use metrics::{Propagation, RetryMetrics};
pub use pause::{pause_task, Pause, ThreadPause};
pub use primitive::{AsyncTransactionPrimitive, ConnectionState, Direct, TransactionPrimitive};
