//! Server schema provisioning.
//!
//! Reference tables are unique by natural key: names compare without case,
//! exception contents compare exactly, and feature names are unique within
//! their context. Fact tables carry no natural key.

use crate::backend::Store;
use crate::error::StoreResult;

/// Which optional fact columns the server schema carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaProfile {
    /// Fact rows carry `UserId` and `VersionId`.
    #[default]
    Tagged,
    /// Historical layout: fact rows carry neither column.
    Untagged,
}

impl SchemaProfile {
    /// Returns true if fact rows carry `UserId`/`VersionId`.
    pub fn tags_facts(&self) -> bool {
        matches!(self, SchemaProfile::Tagged)
    }
}

/// Server tables in creation order (referenced tables first).
pub const TABLES: [&str; 10] = [
    "Context",
    "Step",
    "Exception",
    "Version",
    "\"User\"",
    "Feature",
    "FeatureEntry",
    "FeatureEntryStep",
    "FeatureExceptionEntry",
    "LastChanged",
];

const CREATE_REFERENCE_TABLES: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS Context (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT NOT NULL COLLATE NOCASE UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS Step (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT NOT NULL COLLATE NOCASE UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS Exception (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Content TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS Version (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT NOT NULL COLLATE NOCASE UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS \"User\" (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT NOT NULL COLLATE NOCASE UNIQUE,
        LastReplicatedAt INTEGER NOT NULL,
        VersionId INTEGER NOT NULL REFERENCES Version(Id)
    )",
    "CREATE TABLE IF NOT EXISTS Feature (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        Name TEXT NOT NULL COLLATE NOCASE,
        ContextId INTEGER NOT NULL REFERENCES Context(Id),
        UNIQUE (ContextId, Name)
    )",
];

const CREATE_ENTRY_STEP_TABLE: &str = "CREATE TABLE IF NOT EXISTS FeatureEntryStep (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        TimeSpent REAL NOT NULL,
        Details TEXT NOT NULL,
        FeatureEntryId INTEGER NOT NULL REFERENCES FeatureEntry(Id),
        FeatureStepId INTEGER NOT NULL REFERENCES Step(Id)
    )";

const CREATE_LAST_CHANGED_TABLE: &str = "CREATE TABLE IF NOT EXISTS LastChanged (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        ChangedAt INTEGER NOT NULL
    )";

const TAG_COLUMNS: &str = ",
        UserId INTEGER NOT NULL REFERENCES \"User\"(Id),
        VersionId INTEGER NOT NULL REFERENCES Version(Id)";

fn create_entry_table(profile: SchemaProfile) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS FeatureEntry (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        TimeSpent REAL NOT NULL,
        Details TEXT NOT NULL,
        CreatedAt INTEGER NOT NULL,
        FeatureId INTEGER NOT NULL REFERENCES Feature(Id){}
    )",
        if profile.tags_facts() { TAG_COLUMNS } else { "" }
    )
}

fn create_exception_entry_table(profile: SchemaProfile) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS FeatureExceptionEntry (
        Id INTEGER PRIMARY KEY AUTOINCREMENT,
        ExceptionId INTEGER NOT NULL REFERENCES Exception(Id),
        CreatedAt INTEGER NOT NULL,
        FeatureId INTEGER NOT NULL REFERENCES Feature(Id){}
    )",
        if profile.tags_facts() { TAG_COLUMNS } else { "" }
    )
}

/// Creates every server table that does not exist yet.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn create_schema<S: Store + ?Sized>(store: &mut S, profile: SchemaProfile) -> StoreResult<()> {
    for ddl in CREATE_REFERENCE_TABLES {
        store.execute(ddl, &[])?;
    }
    store.execute(&create_entry_table(profile), &[])?;
    store.execute(CREATE_ENTRY_STEP_TABLE, &[])?;
    store.execute(&create_exception_entry_table(profile), &[])?;
    store.execute(CREATE_LAST_CHANGED_TABLE, &[])?;

    tracing::info!(?profile, tables = TABLES.len(), "server schema created");
    Ok(())
}

/// Drops every server table, dependents first.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn drop_schema<S: Store + ?Sized>(store: &mut S) -> StoreResult<()> {
    for table in TABLES.iter().rev() {
        store.execute(&format!("DROP TABLE IF EXISTS {table}"), &[])?;
    }

    tracing::info!(tables = TABLES.len(), "server schema dropped");
    Ok(())
}
