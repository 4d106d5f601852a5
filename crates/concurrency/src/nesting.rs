//! Per-execution-context nesting depth
//!
//! Every retry-managed invocation increments the depth of the context it runs
//! on and decrements it on exit. A conflict observed at depth > 1 belongs to
//! an enclosing invocation, which will re-run the whole block anyway, so the
//! inner invocation must not retry it.
//!
//! # Contexts
//!
//! - [`ThreadContext`]: OS thread, backed by `thread_local!`
//! - [`TaskContext`]: tokio task, backed by `tokio::task_local!`
//! - [`ExplicitContext`]: a value owned and passed around by the caller
//!
//! None of them is shared between execution units, so a plain `Cell` is
//! enough and no lock is taken.

use std::cell::Cell;
use std::future::Future;

thread_local! {
    /// Nesting depth of the current OS thread
    static THREAD_NESTING_DEPTH: Cell<usize> = const { Cell::new(0) };
}

tokio::task_local! {
    /// Nesting depth of the current tokio task
    static TASK_NESTING_DEPTH: Cell<usize>;
}

/// Storage for one execution unit's nesting depth
pub trait ExecutionContext {
    /// Current depth (0 when no invocation is active)
    fn depth(&self) -> usize;

    /// Overwrite the depth
    fn set_depth(&self, depth: usize);
}

/// The calling OS thread
///
/// The counter is created lazily on first access and lives as long as the
/// thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadContext;

impl ExecutionContext for ThreadContext {
    fn depth(&self) -> usize {
        THREAD_NESTING_DEPTH.with(Cell::get)
    }

    fn set_depth(&self, depth: usize) {
        THREAD_NESTING_DEPTH.with(|d| d.set(depth));
    }
}

/// The calling tokio task
///
/// The counter only exists inside [`TaskContext::scope`]. Outside a scope the
/// depth reads as 0 and writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskContext;

impl TaskContext {
    /// Whether the current task already has a depth counter
    pub fn in_scope() -> bool {
        TASK_NESTING_DEPTH.try_with(|_| ()).is_ok()
    }

    /// Run `fut` with a depth counter, reusing the current one if present
    ///
    /// Nested async invocations on the same task therefore share a counter,
    /// while spawned tasks start from their own.
    pub async fn scope<F: Future>(fut: F) -> F::Output {
        if Self::in_scope() {
            fut.await
        } else {
            TASK_NESTING_DEPTH.scope(Cell::new(0), fut).await
        }
    }
}

impl ExecutionContext for TaskContext {
    fn depth(&self) -> usize {
        TASK_NESTING_DEPTH.try_with(Cell::get).unwrap_or(0)
    }

    fn set_depth(&self, depth: usize) {
        if TASK_NESTING_DEPTH.try_with(|d| d.set(depth)).is_err() {
            tracing::debug!(
                target: "txretry::nesting",
                depth,
                "task nesting depth written outside of a task scope"
            );
        }
    }
}

/// Caller-owned context, for hosts that thread state explicitly
///
/// Not `Sync`: one value per execution unit.
#[derive(Debug, Default)]
pub struct ExplicitContext {
    depth: Cell<usize>,
}

impl ExplicitContext {
    /// Fresh context at depth 0
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionContext for ExplicitContext {
    fn depth(&self) -> usize {
        self.depth.get()
    }

    fn set_depth(&self, depth: usize) {
        self.depth.set(depth);
    }
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for &C {
    fn depth(&self) -> usize {
        (**self).depth()
    }

    fn set_depth(&self, depth: usize) {
        (**self).set_depth(depth)
    }
}

/// Increment the depth of `ctx`, returning the new depth
pub fn increment<C: ExecutionContext + ?Sized>(ctx: &C) -> usize {
    let depth = ctx.depth().saturating_add(1);
    ctx.set_depth(depth);
    depth
}

/// Decrement the depth of `ctx` (saturating at 0), returning the new depth
pub fn decrement<C: ExecutionContext + ?Sized>(ctx: &C) -> usize {
    let depth = ctx.depth().saturating_sub(1);
    ctx.set_depth(depth);
    depth
}

/// Depth of `ctx`
pub fn current_depth<C: ExecutionContext + ?Sized>(ctx: &C) -> usize {
    ctx.depth()
}

/// Whether a conflict seen now must be deferred to an enclosing invocation
///
/// True if the connection already has an open transaction (nested on the
/// same connection) or another retry-managed invocation is active on this
/// context (possibly on a different connection). Both cases are handled
/// the same way.
pub fn is_nested<C: ExecutionContext + ?Sized>(
    ctx: &C,
    connection_has_open_transaction: bool,
) -> bool {
    connection_has_open_transaction || current_depth(ctx) > 1
}

/// Enter a retry-managed invocation on `ctx`
///
/// The returned guard decrements the depth exactly once when dropped, on
/// every exit path including unwinding.
pub fn enter<C: ExecutionContext + ?Sized>(ctx: &C) -> NestingGuard<'_, C> {
    increment(ctx);
    NestingGuard { ctx }
}

/// RAII guard for one level of nesting
#[must_use = "dropping the guard immediately leaves the nesting level"]
pub struct NestingGuard<'a, C: ExecutionContext + ?Sized> {
    ctx: &'a C,
}

impl<C: ExecutionContext + ?Sized> NestingGuard<'_, C> {
    /// Depth of the guarded context right now
    pub fn depth(&self) -> usize {
        current_depth(self.ctx)
    }

    /// See [`is_nested`]
    pub fn is_nested(&self, connection_has_open_transaction: bool) -> bool {
        is_nested(self.ctx, connection_has_open_transaction)
    }
}

impl<C: ExecutionContext + ?Sized> Drop for NestingGuard<'_, C> {
    fn drop(&mut self) {
        decrement(self.ctx);
    }
}
