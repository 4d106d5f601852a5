//! Concurrency layer for txretry
//!
//! This crate holds the per-execution-context state of the retry layer:
//! - Nesting depth tracking for threads, tokio tasks and explicit contexts
//! - Cancellation tokens usable from blocking and async code

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod nesting;

pub use cancel::{CancellationToken, Cancelled};
pub use nesting::{
    current_depth, decrement, enter, increment, is_nested, ExecutionContext, ExplicitContext,
    NestingGuard, TaskContext, ThreadContext,
};
