//! SQLite store backend.

use crate::backend::{Store, TransactionalStore};
use crate::error::{StoreError, StoreResult};
use crate::value::{Row, Value};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::time::Duration;

/// Configuration for opening a SQLite store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Whether SQLite enforces foreign keys.
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }
}

impl StoreConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether foreign keys are enforced.
    #[must_use]
    pub const fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}

/// A store backed by one SQLite connection.
///
/// # Example
///
/// ```rust
/// use usagelog_store::{SqliteStore, Store, StoreExt, Value};
///
/// let mut store = SqliteStore::open_in_memory().unwrap();
/// store.execute("CREATE TABLE t (Id INTEGER PRIMARY KEY, Name TEXT)", &[]).unwrap();
/// store.execute("INSERT INTO t (Name) VALUES (?1)", &[Value::from("a")]).unwrap();
/// assert_eq!(store.last_insert_id().unwrap(), 1);
///
/// let names: Vec<String> = store.query_as("SELECT Name FROM t", &[]).unwrap();
/// assert_eq!(names, vec!["a".to_string()]);
/// ```
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a database file with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or configured.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    /// Opens (or creates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or configured.
    pub fn open_with_config(path: &Path, config: &StoreConfig) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        Self::configure(&conn, config)?;
        tracing::debug!(path = %path.display(), "opened sqlite store");
        Ok(Self { conn })
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn, &StoreConfig::default())?;
        Ok(Self { conn })
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn configure(conn: &Connection, config: &StoreConfig) -> StoreResult<()> {
        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        execute_on(&self.conn, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        query_on(&self.conn, sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        last_insert_id_on(&self.conn)
    }
}

impl TransactionalStore for SqliteStore {
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Store) -> Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self.conn.transaction().map_err(StoreError::from)?;

        let result = {
            let mut scope = SqliteTransaction { conn: &tx };
            f(&mut scope)
        };

        match result {
            Ok(value) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(error = %rollback_err, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// The store view handed out inside [`SqliteStore::transaction`].
struct SqliteTransaction<'a> {
    conn: &'a Connection,
}

impl Store for SqliteTransaction<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> StoreResult<usize> {
        execute_on(self.conn, sql, params)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
        query_on(self.conn, sql, params)
    }

    fn last_insert_id(&mut self) -> StoreResult<i64> {
        last_insert_id_on(self.conn)
    }
}

fn execute_on(conn: &Connection, sql: &str, params: &[Value]) -> StoreResult<usize> {
    let mut stmt = conn.prepare_cached(sql)?;
    Ok(stmt.execute(params_from_iter(params.iter()))?)
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> StoreResult<Vec<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(params.iter()))?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns);
        for index in 0..columns {
            values.push(Value::from(row.get_ref(index)?));
        }
        out.push(Row::new(values));
    }
    Ok(out)
}

fn last_insert_id_on(conn: &Connection) -> StoreResult<i64> {
    // AUTOINCREMENT keys start at 1; 0 means nothing was inserted
    match conn.last_insert_rowid() {
        0 => Err(StoreError::NoGeneratedId),
        id => Ok(id),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) => Value::Integer(n),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}
