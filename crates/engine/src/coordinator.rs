//! Retry coordinator
//!
//! Wraps a caller-supplied operation and re-runs it when the transaction
//! engine reports a transient conflict.
//!
//! Per invocation:
//! 1. Enter one nesting level on the current execution context
//! 2. Run the operation through the transaction primitive
//! 3. On a retryable conflict, retry only if the budget allows and this is
//!    the outermost invocation with no open transaction on its connection;
//!    otherwise hand the original error back
//! 4. Leave the nesting level on every exit path (guard drop)
//!
//! Errors are never wrapped: the caller always sees exactly what the
//! operation produced.

use crate::backoff::{BackoffPolicy, FuzzSource, ThreadRngFuzz};
use crate::config::{global_defaults, RetryConfig, RetryDefaults, RetryOptions};
use crate::logger::{Attempt, RetryLogger, TracingLogger};
use crate::metrics::{Propagation, RetryCounters, RetryMetrics};
use crate::pause::{pause_task, Pause, ThreadPause};
use crate::primitive::{AsyncTransactionPrimitive, TransactionPrimitive};
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;
use txretry_concurrency::nesting::{self, ExecutionContext, TaskContext, ThreadContext};
use txretry_core::{classify_kind, TransactionError};

static DEFAULT_COORDINATOR: Lazy<RetryCoordinator> = Lazy::new(RetryCoordinator::new);

/// Outcome of inspecting one failed attempt
enum Step {
    Retry(Attempt),
    Propagate(Propagation),
}

/// Retry coordinator
///
/// Holds the collaborators shared by every invocation (logger, pause, fuzz
/// source, optional defaults) and the retry counters. It keeps no
/// per-invocation state, so one coordinator can serve many threads or tasks
/// at once, each with its own connection.
///
/// # Example
///
/// ```text
/// let coordinator = RetryCoordinator::new();
/// let total = coordinator.run(&conn, &RetryOptions::new().retry_on("deadlock_detected"), || {
///     let balance = conn.query_balance(account)?;
///     conn.update_balance(account, balance + 10)
/// })?;
/// ```
pub struct RetryCoordinator {
    defaults: Option<RetryDefaults>,
    logger: Option<Arc<dyn RetryLogger>>,
    pause: Arc<dyn Pause>,
    fuzz: Arc<dyn FuzzSource>,
    counters: RetryCounters,
}

impl Default for RetryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("defaults", &self.defaults)
            .field("has_logger", &self.logger.is_some())
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl RetryCoordinator {
    /// Coordinator with tracing logs, thread sleeps, `rand` fuzz and the
    /// process-wide defaults
    pub fn new() -> Self {
        Self {
            defaults: None,
            logger: Some(Arc::new(TracingLogger)),
            pause: Arc::new(ThreadPause),
            fuzz: Arc::new(ThreadRngFuzz),
            counters: RetryCounters::default(),
        }
    }

    /// Replace the retry logger
    pub fn with_logger(mut self, logger: Arc<dyn RetryLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Disable retry logging
    pub fn without_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    /// Replace the blocking pause
    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    /// Replace the fuzz source
    pub fn with_fuzz_source(mut self, fuzz: Arc<dyn FuzzSource>) -> Self {
        self.fuzz = fuzz;
        self
    }

    /// Use `defaults` instead of the process-wide defaults
    pub fn with_defaults(mut self, defaults: RetryDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// Defaults options are resolved against
    pub fn defaults(&self) -> &RetryDefaults {
        self.defaults.as_ref().unwrap_or_else(|| global_defaults())
    }

    /// Resolve per-call options into a configuration
    pub fn resolve(&self, options: &RetryOptions) -> RetryConfig {
        options.resolve(self.defaults())
    }

    /// Counters since this coordinator was created
    pub fn metrics(&self) -> RetryMetrics {
        self.counters.snapshot()
    }

    // ========================================================================
    // Blocking API
    // ========================================================================

    /// Run `operation` on `conn`, retrying transient conflicts
    ///
    /// Nesting is tracked per OS thread.
    pub fn run<P, T, F>(&self, conn: &P, options: &RetryOptions, operation: F) -> Result<T, P::Error>
    where
        P: TransactionPrimitive,
        F: FnMut() -> Result<T, P::Error>,
    {
        let config = self.resolve(options);
        self.run_with_config(conn, &config, operation)
    }

    /// Like [`run`](Self::run) with an already resolved configuration
    pub fn run_with_config<P, T, F>(
        &self,
        conn: &P,
        config: &RetryConfig,
        operation: F,
    ) -> Result<T, P::Error>
    where
        P: TransactionPrimitive,
        F: FnMut() -> Result<T, P::Error>,
    {
        self.run_in(&ThreadContext, conn, config, operation)
    }

    /// Like [`run_with_config`](Self::run_with_config) with nesting tracked
    /// on an explicit context
    pub fn run_in<C, P, T, F>(
        &self,
        ctx: &C,
        conn: &P,
        config: &RetryConfig,
        mut operation: F,
    ) -> Result<T, P::Error>
    where
        C: ExecutionContext + ?Sized,
        P: TransactionPrimitive,
        F: FnMut() -> Result<T, P::Error>,
    {
        let guard = nesting::enter(ctx);
        self.counters.record_invocation();
        let policy = BackoffPolicy::from_config(config);
        let mut retries = 0;

        loop {
            self.counters.record_attempt();
            let error = match conn.begin_and_run(|| operation()) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let step = self.decide(&error, retries, config, &policy, || {
                guard.is_nested(conn.has_open_transaction())
            });
            let attempt = match step {
                Step::Retry(attempt) => attempt,
                Step::Propagate(_) => return Err(error),
            };

            retries = attempt.number;
            if !attempt.wait.is_zero()
                && self
                    .pause
                    .pause(attempt.wait, config.cancel.as_ref())
                    .is_err()
            {
                self.cancelled(retries);
                return Err(error);
            }
        }
    }

    // ========================================================================
    // Async API
    // ========================================================================

    /// Run `operation` on `conn` from a tokio task, retrying transient
    /// conflicts
    ///
    /// Nesting is tracked per task. Pauses suspend only the calling task and
    /// end early if the options carry a cancelled token.
    pub async fn run_async<P, T, F, Fut>(
        &self,
        conn: &P,
        options: &RetryOptions,
        operation: F,
    ) -> Result<T, P::Error>
    where
        P: AsyncTransactionPrimitive,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, P::Error>>,
    {
        let config = self.resolve(options);
        self.run_async_with_config(conn, &config, operation).await
    }

    /// Like [`run_async`](Self::run_async) with an already resolved
    /// configuration
    pub async fn run_async_with_config<P, T, F, Fut>(
        &self,
        conn: &P,
        config: &RetryConfig,
        operation: F,
    ) -> Result<T, P::Error>
    where
        P: AsyncTransactionPrimitive,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, P::Error>>,
    {
        TaskContext::scope(self.run_task(conn, config, operation)).await
    }

    async fn run_task<P, T, F, Fut>(
        &self,
        conn: &P,
        config: &RetryConfig,
        mut operation: F,
    ) -> Result<T, P::Error>
    where
        P: AsyncTransactionPrimitive,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, P::Error>>,
    {
        let guard = nesting::enter(&TaskContext);
        self.counters.record_invocation();
        let policy = BackoffPolicy::from_config(config);
        let mut retries = 0;

        loop {
            self.counters.record_attempt();
            let error = match conn.begin_and_run(|| operation()).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let step = self.decide(&error, retries, config, &policy, || {
                guard.is_nested(conn.has_open_transaction())
            });
            let attempt = match step {
                Step::Retry(attempt) => attempt,
                Step::Propagate(_) => return Err(error),
            };

            retries = attempt.number;
            if !attempt.wait.is_zero()
                && pause_task(attempt.wait, config.cancel.as_ref())
                    .await
                    .is_err()
            {
                self.cancelled(retries);
                return Err(error);
            }
        }
    }

    // ========================================================================
    // Decision
    // ========================================================================

    /// Decide what to do after a failed attempt
    ///
    /// `nested` is only evaluated for retryable conflicts within budget.
    fn decide<E, N>(
        &self,
        error: &E,
        retries: usize,
        config: &RetryConfig,
        policy: &BackoffPolicy,
        nested: N,
    ) -> Step
    where
        E: TransactionError + ?Sized,
        N: FnOnce() -> bool,
    {
        let kind = error.kind();

        let step = if !classify_kind(&kind, &config.retryable_kinds).is_retryable() {
            Step::Propagate(Propagation::Terminal)
        } else if retries >= config.max_retries {
            Step::Propagate(Propagation::Exhausted)
        } else if nested() {
            Step::Propagate(Propagation::Deferred)
        } else if config.is_cancelled() {
            Step::Propagate(Propagation::Cancelled)
        } else {
            let number = retries + 1;
            Step::Retry(Attempt {
                number,
                wait: policy.compute_wait(number, &*self.fuzz),
                kind,
            })
        };

        match &step {
            Step::Retry(attempt) => {
                self.counters.record_retry();
                if let Some(logger) = &self.logger {
                    logger.warn(attempt, &attempt.message());
                }
            }
            Step::Propagate(reason) => {
                self.counters.record_propagation(*reason);
                debug!(
                    target: "txretry::retry",
                    reason = ?reason,
                    kind = %error.kind(),
                    retries,
                    "Propagating transaction error"
                );
            }
        }
        step
    }

    fn cancelled(&self, retries: usize) {
        self.counters.record_propagation(Propagation::Cancelled);
        debug!(target: "txretry::retry", retries, "Retry pause cancelled");
    }
}

/// Shared coordinator used by [`run`] and [`TransactionRetryExt`]
pub fn default_coordinator() -> &'static RetryCoordinator {
    &*DEFAULT_COORDINATOR
}

/// Run `operation` on `conn` with the shared coordinator
pub fn run<P, T, F>(conn: &P, options: &RetryOptions, operation: F) -> Result<T, P::Error>
where
    P: TransactionPrimitive,
    F: FnMut() -> Result<T, P::Error>,
{
    default_coordinator().run(conn, options, operation)
}

/// Async [`run`] with the shared coordinator
pub async fn run_async<P, T, F, Fut>(
    conn: &P,
    options: &RetryOptions,
    operation: F,
) -> Result<T, P::Error>
where
    P: AsyncTransactionPrimitive,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, P::Error>>,
{
    default_coordinator()
        .run_async(conn, options, operation)
        .await
}

/// `conn.transaction_with_retry(...)` for every blocking primitive
pub trait TransactionRetryExt: TransactionPrimitive + Sized {
    /// Run `operation` in a transaction on `self`, retrying transient
    /// conflicts with the shared coordinator
    fn transaction_with_retry<T, F>(
        &self,
        options: &RetryOptions,
        operation: F,
    ) -> Result<T, Self::Error>
    where
        F: FnMut() -> Result<T, Self::Error>,
    {
        run(self, options, operation)
    }
}

impl<P: TransactionPrimitive> TransactionRetryExt for P {}
