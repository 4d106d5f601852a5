//! Cancellation token shared between a caller and a retry invocation
//!
//! Cancelling wakes both blocking waiters (parked on a condvar) and async
//! waiters (parked on a `Notify`), so the same token works for threads and
//! tokio tasks.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Notify;

/// Returned when a wait was interrupted by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

struct Inner {
    cancelled: Mutex<bool>,
    cond: Condvar,
    notify: Notify,
}

/// Cloneable handle; all clones observe the same cancellation
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// New, not yet cancelled token
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: Mutex::new(false),
                cond: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        if *cancelled {
            return;
        }
        *cancelled = true;
        drop(cancelled);
        self.inner.cond.notify_all();
        self.inner.notify.notify_waiters();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Block the current thread for `timeout` or until cancelled
    ///
    /// Returns `Err(Cancelled)` if the token fired before the timeout elapsed.
    /// A timeout too large to express as an `Instant` waits for cancellation
    /// only.
    pub fn sleep(&self, timeout: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now().checked_add(timeout);
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .cond
                        .wait_until(&mut cancelled, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.inner.cond.wait(&mut cancelled),
            }
        }
        if *cancelled {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once the token is cancelled
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
