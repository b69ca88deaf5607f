//! Test fixtures and server helpers.
//!
//! Provides provisioned server stores and the sample snapshots the
//! integration tests and benches share.

use std::path::PathBuf;
use tempfile::TempDir;
use usagelog_codec::{
    pack, Bytes, ContextRow, ExceptionRow, FeatureEntryRow, FeatureEntryStepRow,
    FeatureExceptionEntryRow, FeatureRow, Snapshot, StepRow, Ticks,
};
use usagelog_store::{create_schema, SchemaProfile, SqliteStore, Store, StoreExt};

/// A provisioned server store with automatic cleanup.
pub struct TestServer {
    /// The store.
    pub store: SqliteStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestServer {
    /// Creates an in-memory server with the tagged schema.
    pub fn memory() -> Self {
        Self::memory_with(SchemaProfile::Tagged)
    }

    /// Creates an in-memory server with the given schema profile.
    pub fn memory_with(profile: SchemaProfile) -> Self {
        let mut store = SqliteStore::open_in_memory().expect("Failed to open in-memory store");
        create_schema(&mut store, profile).expect("Failed to create schema");
        Self {
            store,
            _temp_dir: None,
        }
    }

    /// Creates a file-backed server with the tagged schema.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("server.db");
        let mut store = SqliteStore::open(&path).expect("Failed to open file store");
        create_schema(&mut store, SchemaProfile::Tagged).expect("Failed to create schema");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the database path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("server.db"))
    }

    /// Counts the rows of a table.
    pub fn count(&mut self, table: &str) -> i64 {
        count_rows(&mut self.store, table)
    }
}

impl std::ops::Deref for TestServer {
    type Target = SqliteStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl std::ops::DerefMut for TestServer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Counts the rows of a table.
pub fn count_rows<S: Store + ?Sized>(store: &mut S, table: &str) -> i64 {
    store
        .query_scalar(&format!("SELECT COUNT(*) FROM {table}"), &[])
        .expect("Failed to count rows")
        .unwrap_or(0)
}

/// Tick timestamp of the sample snapshot's first feature entry.
pub const SAMPLE_CREATED_AT: Ticks = Ticks(638_400_000_000_000_000);

/// A small snapshot: one use of "CreateActivity" in the "Agenda" context,
/// with one step and one exception.
pub fn sample_snapshot() -> Snapshot {
    Snapshot {
        contexts: vec![ContextRow {
            id: 1,
            name: "Agenda".into(),
        }],
        steps: vec![StepRow {
            id: 1,
            name: "Save".into(),
        }],
        exceptions: vec![ExceptionRow {
            id: 1,
            content: "NullReferenceException: Object reference not set to an instance of an object."
                .into(),
        }],
        features: vec![FeatureRow {
            id: 1,
            name: "CreateActivity".into(),
            context_id: 1,
        }],
        feature_entries: vec![FeatureEntryRow {
            id: 1,
            time_spent: 12.5,
            details: "opened from toolbar".into(),
            created_at: SAMPLE_CREATED_AT,
            feature_id: 1,
        }],
        feature_entry_steps: vec![FeatureEntryStepRow {
            time_spent: 3.25,
            details: "title entered".into(),
            feature_entry_id: 1,
            feature_step_id: 1,
        }],
        feature_exception_entries: vec![FeatureExceptionEntryRow {
            exception_id: 1,
            created_at: Ticks(SAMPLE_CREATED_AT.as_i64() + 50_000_000),
            feature_id: 1,
        }],
    }
}

/// The sample snapshot, packed.
pub fn sample_payload() -> Bytes {
    pack(&sample_snapshot()).expect("Failed to pack sample snapshot")
}

/// The sample snapshot as pretty-printed JSON.
pub fn sample_snapshot_json() -> String {
    serde_json::to_string_pretty(&sample_snapshot()).expect("Failed to render sample snapshot")
}

/// A snapshot with one of each reference row and `n` rows in every fact
/// section.
pub fn snapshot_with_facts(n: usize) -> Snapshot {
    let mut snapshot = sample_snapshot();
    snapshot.feature_entries = (0..n)
        .map(|i| FeatureEntryRow {
            id: i as i64 + 1,
            time_spent: i as f64,
            details: format!("entry {i}"),
            created_at: Ticks(SAMPLE_CREATED_AT.as_i64() + i as i64),
            feature_id: 1,
        })
        .collect();
    snapshot.feature_entry_steps = (0..n)
        .map(|i| FeatureEntryStepRow {
            time_spent: 0.5,
            details: format!("step {i}"),
            feature_entry_id: i as i64 + 1,
            feature_step_id: 1,
        })
        .collect();
    snapshot.feature_exception_entries = (0..n)
        .map(|i| FeatureExceptionEntryRow {
            exception_id: 1,
            created_at: Ticks(SAMPLE_CREATED_AT.as_i64() + i as i64),
            feature_id: 1,
        })
        .collect();
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use usagelog_codec::unpack;

    #[test]
    fn memory_server_has_schema() {
        let mut server = TestServer::memory();
        assert_eq!(server.count("Context"), 0);
        assert!(server.path().is_none());
    }

    #[test]
    fn file_server_has_path() {
        let mut server = TestServer::file();
        assert!(server.path().is_some_and(|p| p.exists()));
        assert_eq!(server.count("LastChanged"), 0);
    }

    #[test]
    fn sample_payload_decodes() {
        assert_eq!(unpack(&sample_payload()).unwrap(), sample_snapshot());
    }

    #[test]
    fn sample_json_parses_back() {
        let parsed: Snapshot = serde_json::from_str(&sample_snapshot_json()).unwrap();
        assert_eq!(parsed, sample_snapshot());
    }

    #[test]
    fn facts_snapshot_sizes() {
        let snapshot = snapshot_with_facts(5);
        assert_eq!(snapshot.feature_entries.len(), 5);
        assert_eq!(snapshot.feature_entry_steps.len(), 5);
        assert_eq!(snapshot.feature_exception_entries.len(), 5);
        assert_eq!(snapshot.feature_entry_steps[4].feature_entry_id, 5);
    }
}
