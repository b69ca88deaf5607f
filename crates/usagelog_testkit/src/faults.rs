//! Fault-injecting store wrappers.
//!
//! These wrap a real store and interfere with selected statements, so
//! tests can observe how a run behaves when the store fails part-way or
//! when something happens between two statements.

use parking_lot::Mutex;
use std::sync::Arc;
use usagelog_store::{Row, Store, StoreError, StoreResult, TransactionalStore, Value};

#[derive(Debug)]
struct FaultState {
    prefix: String,
    skip: usize,
    seen: usize,
    tripped: bool,
}

impl FaultState {
    fn observe(&mut self, sql: &str) -> StoreResult<()> {
        if !sql.trim_start().starts_with(&self.prefix) {
            return Ok(());
        }
        self.seen += 1;
        if self.seen > self.skip {
            self.tripped = true;
            return Err(StoreError::rejected(format!("injected fault on: {sql}")));
        }
        Ok(())
    }
}

/// A store that rejects statements starting with a given prefix.
///
/// The first `skip` matching statements pass through; every later match
/// fails with [`StoreError::Rejected`] without reaching the inner store.
#[derive(Debug)]
pub struct FailingStore<S> {
    inner: S,
    state: Arc<Mutex<FaultState>>,
}

impl<S> FailingStore<S> {
    /// Fails every statement starting with `prefix`.
    pub fn on_prefix(inner: S, prefix: impl Into<String>) -> Self {
        Self::on_nth(inner, prefix, 0)
    }

    /// Lets `skip` matching statements through, then fails the rest.
    pub fn on_nth(inner: S, prefix: impl Into<String>, skip: usize) -> Self {
        Self {
            inner,
            state: Arc::new(Mutex::new(FaultState {
                prefix: prefix.into(),
                skip,
                seen: 0,
                tripped: false,
            })),
        }
    }

    /// Returns true once a fault was injected.
    pub fn tripped(&self) -> bool {
        self.state.lock().tripped
    }

    /// Returns the wrapped store.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Store> Store for FailingStore<S> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        self.state.lock().observe(sql)?;
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        self.state.lock().observe(sql)?;
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        self.inner.last_insert_id()
    }
}

impl<S: TransactionalStore> TransactionalStore for FailingStore<S> {
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Store) -> Result<T, E>,
        E: From<StoreError>,
    {
        let state = Arc::clone(&self.state);
        self.inner.transaction(move |txn| {
            let mut scope = FaultScope { inner: txn, state };
            f(&mut scope)
        })
    }
}

struct FaultScope<'a> {
    inner: &'a mut dyn Store,
    state: Arc<Mutex<FaultState>>,
}

impl Store for FaultScope<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        self.state.lock().observe(sql)?;
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        self.state.lock().observe(sql)?;
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        self.inner.last_insert_id()
    }
}

/// Callback run before every statement a [`HookStore`] forwards.
pub type StatementHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A store that calls a hook before forwarding each statement.
///
/// Useful for tripping a cancel flag or stalling the clock at a chosen
/// point of a run.
pub struct HookStore<S> {
    inner: S,
    hook: StatementHook,
}

impl<S> HookStore<S> {
    /// Wraps a store with a hook.
    pub fn new(inner: S, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            inner,
            hook: Arc::new(hook),
        }
    }

    /// Returns the wrapped store.
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwraps the store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Store> Store for HookStore<S> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        (self.hook)(sql);
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        (self.hook)(sql);
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        self.inner.last_insert_id()
    }
}

impl<S: TransactionalStore> TransactionalStore for HookStore<S> {
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Store) -> Result<T, E>,
        E: From<StoreError>,
    {
        let hook = Arc::clone(&self.hook);
        self.inner.transaction(move |txn| {
            let mut scope = HookScope { inner: txn, hook };
            f(&mut scope)
        })
    }
}

struct HookScope<'a> {
    inner: &'a mut dyn Store,
    hook: StatementHook,
}

impl Store for HookScope<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        (self.hook)(sql);
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        (self.hook)(sql);
        self.inner.query(sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        self.inner.last_insert_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use usagelog_store::{SqliteStore, StoreExt};

    fn store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().expect("open store");
        store
            .execute("CREATE TABLE Step (Id INTEGER PRIMARY KEY, Name TEXT)", &[])
            .expect("create table");
        store
    }

    #[test]
    fn fails_matching_statements_after_skip() {
        let mut store = FailingStore::on_nth(store(), "INSERT INTO Step", 1);
        let insert = "INSERT INTO Step (Name) VALUES (?1)";

        assert!(store.execute(insert, &[Value::from("a")]).is_ok());
        assert!(!store.tripped());
        assert!(matches!(
            store.execute(insert, &[Value::from("b")]),
            Err(StoreError::Rejected(_))
        ));
        assert!(store.tripped());

        let count: Option<i64> = store
            .query_scalar("SELECT COUNT(*) FROM Step", &[])
            .expect("count");
        assert_eq!(count, Some(1));
    }

    #[test]
    fn fault_inside_transaction_rolls_back() {
        let mut store = FailingStore::on_prefix(store(), "UPDATE");
        let result: StoreResult<()> = store.transaction(|txn| {
            txn.execute("INSERT INTO Step (Name) VALUES ('a')", &[])?;
            txn.execute("UPDATE Step SET Name = 'b'", &[])?;
            Ok(())
        });
        assert!(result.is_err());

        let count: Option<i64> = store
            .into_inner()
            .query_scalar("SELECT COUNT(*) FROM Step", &[])
            .expect("count");
        assert_eq!(count, Some(0));
    }

    #[test]
    fn hook_sees_every_statement() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut store = HookStore::new(store(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.execute("INSERT INTO Step (Name) VALUES ('a')", &[]).expect("insert");
        let _: StoreResult<()> = store.transaction(|txn| {
            txn.query("SELECT Id FROM Step", &[])?;
            Ok(())
        });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
