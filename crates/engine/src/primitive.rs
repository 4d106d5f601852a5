//! Collaborators the coordinator drives
//!
//! The coordinator never begins, commits or rolls back anything itself. It
//! hands the caller's operation to a [`TransactionPrimitive`] (or its async
//! twin) and asks the connection whether a transaction is already open.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use txretry_core::TransactionError;

/// Connection state query
pub trait ConnectionState {
    /// Whether the connection already has an open transaction
    fn has_open_transaction(&self) -> bool;
}

/// Blocking transaction primitive of the host engine
///
/// `begin_and_run` opens a transaction (or savepoint), runs `operation`,
/// commits on `Ok` and rolls back on `Err`. Its behavior is opaque to the
/// coordinator.
pub trait TransactionPrimitive: ConnectionState {
    /// Error type raised by the engine and by operations
    type Error: TransactionError;

    /// Run `operation` inside a transaction
    fn begin_and_run<T, F>(&self, operation: F) -> Result<T, Self::Error>
    where
        F: FnOnce() -> Result<T, Self::Error>;
}

/// Async transaction primitive for tokio hosts
pub trait AsyncTransactionPrimitive: ConnectionState {
    /// Error type raised by the engine and by operations
    type Error: TransactionError;

    /// Run the future produced by `operation` inside a transaction
    fn begin_and_run<T, F, Fut>(&self, operation: F) -> impl Future<Output = Result<T, Self::Error>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Self::Error>>;
}

impl<C: ConnectionState + ?Sized> ConnectionState for &C {
    fn has_open_transaction(&self) -> bool {
        (**self).has_open_transaction()
    }
}

impl<C: ConnectionState + ?Sized> ConnectionState for Arc<C> {
    fn has_open_transaction(&self) -> bool {
        (**self).has_open_transaction()
    }
}

impl<P: TransactionPrimitive> TransactionPrimitive for &P {
    type Error = P::Error;

    fn begin_and_run<T, F>(&self, operation: F) -> Result<T, Self::Error>
    where
        F: FnOnce() -> Result<T, Self::Error>,
    {
        (**self).begin_and_run(operation)
    }
}

impl<P: TransactionPrimitive> TransactionPrimitive for Arc<P> {
    type Error = P::Error;

    fn begin_and_run<T, F>(&self, operation: F) -> Result<T, Self::Error>
    where
        F: FnOnce() -> Result<T, Self::Error>,
    {
        (**self).begin_and_run(operation)
    }
}

/// Primitive for operations that manage their own transaction
///
/// Runs the operation as-is and never reports an open transaction, so only
/// the nesting depth decides whether a call is nested.
pub struct Direct<E> {
    _error: PhantomData<fn() -> E>,
}

impl<E> Direct<E> {
    /// New pass-through primitive
    pub fn new() -> Self {
        Self {
            _error: PhantomData,
        }
    }
}

impl<E> Default for Direct<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Direct<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E> Copy for Direct<E> {}

impl<E> std::fmt::Debug for Direct<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Direct")
    }
}

impl<E> ConnectionState for Direct<E> {
    fn has_open_transaction(&self) -> bool {
        false
    }
}

impl<E: TransactionError> TransactionPrimitive for Direct<E> {
    type Error = E;

    fn begin_and_run<T, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        operation()
    }
}

impl<E: TransactionError> AsyncTransactionPrimitive for Direct<E> {
    type Error = E;

    async fn begin_and_run<T, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        operation().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txretry_core::TxnError;

    #[test]
    fn test_direct_runs_operation() {
        let direct = Direct::<TxnError>::new();
        assert!(!direct.has_open_transaction());
        let value = TransactionPrimitive::begin_and_run(&direct, || Ok::<_, TxnError>(5));
        assert_eq!(value, Ok(5));
    }

    #[test]
    fn test_references_delegate() {
        let direct = Arc::new(Direct::<TxnError>::new());
        let by_ref = &direct;
        assert!(!by_ref.has_open_transaction());
        let err = TransactionPrimitive::begin_and_run(&by_ref, || {
            Err::<(), _>(TxnError::conflict("x"))
        });
        assert_eq!(err, Err(TxnError::conflict("x")));
    }

    #[tokio::test]
    async fn test_direct_async() {
        let direct = Direct::<TxnError>::new();
        let value =
            AsyncTransactionPrimitive::begin_and_run(&direct, || async { Ok::<_, TxnError>(7) })
                .await;
        assert_eq!(value, Ok(7));
    }
}
