//! Schema commands.

use std::path::Path;
use usagelog_store::{create_schema, drop_schema, SchemaProfile, SqliteStore};

/// Creates the server tables in `db`.
pub fn create(db: &Path, profile: SchemaProfile) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = SqliteStore::open(db)?;
    create_schema(&mut store, profile)?;
    println!("Created {profile:?} schema in {}", db.display());
    Ok(())
}

/// Drops the server tables from `db`.
pub fn remove(db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !db.exists() {
        return Err(format!("No database found at {}", db.display()).into());
    }
    let mut store = SqliteStore::open(db)?;
    drop_schema(&mut store)?;
    println!("Dropped schema in {}", db.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use usagelog_store::StoreExt;

    #[test]
    fn create_then_drop() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("server.db");

        create(&db, SchemaProfile::Tagged).unwrap();
        let mut store = SqliteStore::open(&db).unwrap();
        let tables: Option<i64> = store
            .query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'LastChanged'",
                &[],
            )
            .unwrap();
        assert_eq!(tables, Some(1));

        remove(&db).unwrap();
        let tables: Option<i64> = store
            .query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'LastChanged'",
                &[],
            )
            .unwrap();
        assert_eq!(tables, Some(0));
    }

    #[test]
    fn drop_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove(&dir.path().join("absent.db")).is_err());
    }
}
