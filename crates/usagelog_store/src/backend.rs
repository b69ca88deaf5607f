//! Store trait definitions.

use crate::error::{StoreError, StoreResult};
use crate::value::{FromRow, FromValue, Row, Value};

/// The store boundary used by replication.
///
/// A store is an active connection or transaction. Replication needs only
/// three operations from it; anything exposing them can back a run.
///
/// # Invariants
///
/// - `last_insert_id` returns the identifier generated by the most recent
///   successful insert on this same connection or transaction
/// - A single multi-row insert generates contiguous, ascending identifiers,
///   so its rows hold `last_insert_id - n + 1 ..= last_insert_id`
/// - Parameters are bound positionally (`?1`, `?2`, ...)
///
/// # Implementors
///
/// - [`super::SqliteStore`] - SQLite connection
/// - [`super::RecordingStore`] - Wrapper that records every statement
pub trait Store {
    /// Executes a statement that returns no rows.
    ///
    /// Returns the number of rows the statement changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement cannot be prepared or fails.
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize>;

    /// Runs a query and returns every result row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be prepared or fails.
    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>>;

    /// Returns the identifier most recently generated on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoGeneratedId`] if nothing was inserted yet.
    fn last_insert_id(&mut self) -> StoreResult<i64>;
}

impl<S: Store + ?Sized> Store for &mut S {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        (**self).execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        (**self).last_insert_id()
    }
}

/// Typed query helpers available on every store.
pub trait StoreExt: Store {
    /// Runs a query and converts every row.
    fn query_as<T: FromRow>(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<T>> {
        self.query(sql, params)?.iter().map(T::from_row).collect()
    }

    /// Runs a query and returns the first column of the first row, if any.
    fn query_scalar<T: FromValue>(
        &mut self,
        sql: &str,
        params: &[Value],
    ) -> StoreResult<Option<T>> {
        match self.query(sql, params)?.first() {
            Some(row) => row.read(0).map(Some),
            None => Ok(None),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// A store that can scope work inside one transaction.
pub trait TransactionalStore {
    /// Runs `f` inside a transaction.
    ///
    /// The transaction commits if `f` returns `Ok` and rolls back on every
    /// other exit path, including an early `Err` from `f`.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`, or a store error if the
    /// transaction cannot be opened or committed.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Store) -> Result<T, E>,
        E: From<StoreError>;
}
