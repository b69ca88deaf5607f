//! # Usagelog Store
//!
//! The store boundary replication writes through, plus a SQLite backend.
//!
//! Replication never talks to a database driver directly. It issues SQL
//! through [`Store`], reads rows back as [`Row`]s, and asks for the last
//! generated identifier. Anything providing those three operations can
//! back a replication run.
//!
//! ## Design Principles
//!
//! - Parameters are passed per statement as [`Value`] slices
//! - A transaction is a closure scope: commit on `Ok`, rollback otherwise
//! - Multi-row inserts generate contiguous ascending identifiers
//!
//! ## Available Stores
//!
//! - [`SqliteStore`] - One SQLite connection
//! - [`RecordingStore`] - Wrapper that logs every statement it forwards
//!
//! ## Example
//!
//! ```rust
//! use usagelog_store::{create_schema, SchemaProfile, SqliteStore, StoreExt};
//!
//! let mut store = SqliteStore::open_in_memory().unwrap();
//! create_schema(&mut store, SchemaProfile::Tagged).unwrap();
//!
//! let contexts: Option<i64> = store.query_scalar("SELECT COUNT(*) FROM Context", &[]).unwrap();
//! assert_eq!(contexts, Some(0));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod recording;
mod schema;
mod sqlite;
mod value;

pub use backend::{Store, StoreExt, TransactionalStore};
pub use error::{StoreError, StoreResult};
pub use recording::{RecordedStatement, RecordingStore, StatementKind};
pub use schema::{create_schema, drop_schema, SchemaProfile, TABLES};
pub use sqlite::{SqliteStore, StoreConfig};
pub use value::{FromRow, FromValue, Row, Value};
