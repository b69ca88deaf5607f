//! A store wrapper that records every statement it forwards.

use crate::backend::{Store, TransactionalStore};
use crate::error::{StoreError, StoreResult};
use crate::value::{Row, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// The leading verb of a recorded statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// `SELECT ...`
    Select,
    /// `INSERT ...`
    Insert,
    /// `UPDATE ...`
    Update,
    /// Anything else (DDL, pragmas, deletes).
    Other,
}

impl StatementKind {
    fn classify(sql: &str) -> Self {
        let verb = sql
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match verb.as_str() {
            "SELECT" => StatementKind::Select,
            "INSERT" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            _ => StatementKind::Other,
        }
    }
}

/// One statement seen by a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatement {
    /// Statement text as issued.
    pub sql: String,
    /// Number of bound parameters.
    pub param_count: usize,
    /// Leading verb.
    pub kind: StatementKind,
}

impl RecordedStatement {
    fn new(sql: &str, params: &[Value]) -> Self {
        Self {
            sql: sql.to_owned(),
            param_count: params.len(),
            kind: StatementKind::classify(sql),
        }
    }

    /// Returns true if this statement inserts into `table`.
    pub fn inserts_into(&self, table: &str) -> bool {
        self.kind == StatementKind::Insert
            && self
                .sql
                .trim_start()
                .get("INSERT INTO ".len()..)
                .and_then(|rest| rest.split([' ', '(']).next())
                .is_some_and(|name| name.trim_matches('"') == table.trim_matches('"'))
    }
}

/// Forwards to an inner store and keeps a log of every statement.
///
/// Statements issued inside [`TransactionalStore::transaction`] are
/// recorded too. The log is shared between clones of the handle returned
/// by [`RecordingStore::log`], so it stays readable after the store moves.
#[derive(Debug)]
pub struct RecordingStore<S> {
    inner: S,
    log: Arc<Mutex<Vec<RecordedStatement>>>,
}

impl<S> RecordingStore<S> {
    /// Wraps a store.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a snapshot of the recorded statements.
    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.log.lock().clone()
    }

    /// Returns a shared handle to the log.
    pub fn log(&self) -> Arc<Mutex<Vec<RecordedStatement>>> {
        Arc::clone(&self.log)
    }

    /// Counts recorded statements that insert into `table`.
    pub fn inserts_into(&self, table: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|stmt| stmt.inserts_into(table))
            .count()
    }

    /// Counts recorded statements of one kind.
    pub fn count_kind(&self, kind: StatementKind) -> usize {
        self.log.lock().iter().filter(|stmt| stmt.kind == kind).count()
    }

    /// Forgets every recorded statement.
    pub fn clear(&self) {
        self.log.lock().clear();
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns the wrapped store mutably. Statements issued through it are
    /// not recorded.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Store> Store for RecordingStore<S> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        self.log.lock().push(RecordedStatement::new(sql, params));
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        self.log.lock().push(RecordedStatement::new(sql, params));
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        self.inner.last_insert_id()
    }
}

impl<S: TransactionalStore> TransactionalStore for RecordingStore<S> {
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Store) -> Result<T, E>,
        E: From<StoreError>,
    {
        let log = Arc::clone(&self.log);
        self.inner.transaction(move |txn| {
            let mut scope = Recorder { inner: txn, log };
            f(&mut scope)
        })
    }
}

struct Recorder<'a> {
    inner: &'a mut dyn Store,
    log: Arc<Mutex<Vec<RecordedStatement>>>,
}

impl Store for Recorder<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        self.log.lock().push(RecordedStatement::new(sql, params));
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        self.log.lock().push(RecordedStatement::new(sql, params));
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        self.inner.last_insert_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteStore;

    fn recording() -> RecordingStore<SqliteStore> {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .execute(
                "CREATE TABLE Step (Id INTEGER PRIMARY KEY AUTOINCREMENT, Name TEXT)",
                &[],
            )
            .unwrap();
        RecordingStore::new(store)
    }

    #[test]
    fn classifies_statements() {
        assert_eq!(StatementKind::classify("  select 1"), StatementKind::Select);
        assert_eq!(
            StatementKind::classify("INSERT INTO Step (Name) VALUES (?1)"),
            StatementKind::Insert
        );
        assert_eq!(StatementKind::classify("UPDATE x SET y = 1"), StatementKind::Update);
        assert_eq!(StatementKind::classify("DROP TABLE x"), StatementKind::Other);
        assert_eq!(StatementKind::classify(""), StatementKind::Other);
    }

    #[test]
    fn matches_insert_target() {
        let stmt = RecordedStatement::new("INSERT INTO \"User\" (Name) VALUES (?1)", &[]);
        assert!(stmt.inserts_into("User"));
        assert!(stmt.inserts_into("\"User\""));

        let sql = "INSERT INTO FeatureEntryStep(TimeSpent) VALUES (?1)";
        let stmt = RecordedStatement::new(sql, &[]);
        assert!(stmt.inserts_into("FeatureEntryStep"));
        assert!(!stmt.inserts_into("FeatureEntry"));
    }

    #[test]
    fn records_direct_statements() {
        let mut store = recording();
        store
            .execute(
                "INSERT INTO Step (Name) VALUES (?1), (?2)",
                &[Value::from("Save"), Value::from("Open")],
            )
            .unwrap();
        store.query("SELECT Id FROM Step", &[]).unwrap();

        let statements = store.statements();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0].param_count, 2);
        assert_eq!(store.inserts_into("Step"), 1);
        assert_eq!(store.count_kind(StatementKind::Select), 1);
    }

    #[test]
    fn records_inside_transaction() {
        let mut store = recording();
        store
            .transaction(|txn| -> StoreResult<()> {
                txn.execute("INSERT INTO Step (Name) VALUES (?1)", &[Value::from("Save")])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.inserts_into("Step"), 1);

        store.clear();
        assert!(store.statements().is_empty());
    }
}
