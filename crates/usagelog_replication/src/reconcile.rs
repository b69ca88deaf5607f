//! Create-or-reuse reconciliation of reference rows.
//!
//! For one reference kind, every incoming device row is matched against the
//! server catalog by natural key. A hit maps the device id to the existing
//! server row; a miss inserts exactly one server row and records it in the
//! catalog immediately, so later duplicates in the same payload reuse it.

use crate::catalog::{Catalog, FeatureKey, IdMap, NameKey};
use crate::error::{EntityKind, ReplicationResult};
use std::hash::Hash;
use usagelog_codec::{ContextRow, ExceptionRow, FeatureRow, StepRow};
use usagelog_store::{Store, StoreExt, Value};

/// Created and reused row counts for one reference kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    /// Server rows inserted by the run.
    pub created: usize,
    /// Device rows mapped onto existing server rows.
    pub reused: usize,
}

impl KindCounts {
    /// Returns the number of device rows processed.
    pub fn total(&self) -> usize {
        self.created + self.reused
    }
}

/// One incoming device row of a reference kind.
#[derive(Debug, Clone)]
pub struct Candidate<K> {
    /// Device-local id.
    pub device_id: i64,
    /// Natural key.
    pub key: K,
    /// Parameters for the insert statement, used only on a catalog miss.
    pub params: Vec<Value>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Device id to server id.
    pub ids: IdMap,
    /// Created and reused counts.
    pub counts: KindCounts,
}

impl Reconciled {
    fn empty(kind: EntityKind) -> Self {
        Self {
            ids: IdMap::new(kind),
            counts: KindCounts::default(),
        }
    }
}

/// Reconciles candidates of one kind against a catalog.
///
/// Candidates are processed in order. `insert_sql` must insert one row from
/// the candidate's parameters.
///
/// # Errors
///
/// Returns a store error if an insert fails or no id is generated.
pub fn reconcile<K: Eq + Hash>(
    store: &mut dyn Store,
    catalog: &mut Catalog<K>,
    kind: EntityKind,
    candidates: impl IntoIterator<Item = Candidate<K>>,
    insert_sql: &str,
) -> ReplicationResult<Reconciled> {
    let mut out = Reconciled::empty(kind);

    for candidate in candidates {
        let server_id = match catalog.get(&candidate.key) {
            Some(id) => {
                out.counts.reused += 1;
                id
            }
            None => {
                store.execute(insert_sql, &candidate.params)?;
                let id = store.last_insert_id()?;
                catalog.insert(candidate.key, id);
                out.counts.created += 1;
                id
            }
        };
        out.ids.insert(candidate.device_id, server_id);
    }

    tracing::debug!(
        %kind,
        created = out.counts.created,
        reused = out.counts.reused,
        "reconciled"
    );
    Ok(out)
}

/// Loads a name-keyed catalog from `table` (`Id`, `Name` columns).
///
/// # Errors
///
/// Returns a store error if the read fails.
pub fn load_name_catalog(
    store: &mut dyn Store,
    table: &str,
) -> ReplicationResult<Catalog<NameKey>> {
    let rows: Vec<(i64, String)> =
        store.query_as(&format!("SELECT Id, Name FROM {table} ORDER BY Id"), &[])?;
    Ok(Catalog::from_rows(
        rows.into_iter().map(|(id, name)| (NameKey::new(&name), id)),
    ))
}

/// Loads the exception catalog, keyed by exact content.
///
/// # Errors
///
/// Returns a store error if the read fails.
pub fn load_exception_catalog(store: &mut dyn Store) -> ReplicationResult<Catalog<String>> {
    let rows: Vec<(i64, String)> =
        store.query_as("SELECT Id, Content FROM Exception ORDER BY Id", &[])?;
    Ok(Catalog::from_rows(
        rows.into_iter().map(|(id, content)| (content, id)),
    ))
}

/// Loads the feature catalog, keyed by context and name.
///
/// # Errors
///
/// Returns a store error if the read fails.
pub fn load_feature_catalog(store: &mut dyn Store) -> ReplicationResult<Catalog<FeatureKey>> {
    let rows: Vec<(i64, i64, String)> =
        store.query_as("SELECT Id, ContextId, Name FROM Feature ORDER BY Id", &[])?;
    Ok(Catalog::from_rows(rows.into_iter().map(|(id, context_id, name)| {
        (FeatureKey::new(context_id, &name), id)
    })))
}

fn reconcile_named(
    store: &mut dyn Store,
    kind: EntityKind,
    rows: impl ExactSizeIterator<Item = (i64, String)>,
) -> ReplicationResult<Reconciled> {
    if rows.len() == 0 {
        return Ok(Reconciled::empty(kind));
    }
    let table = kind.table();
    let mut catalog = load_name_catalog(store, table)?;
    let candidates = rows.map(|(device_id, name)| Candidate {
        device_id,
        key: NameKey::new(&name),
        params: vec![Value::Text(name)],
    });
    reconcile(
        store,
        &mut catalog,
        kind,
        candidates,
        &format!("INSERT INTO {table} (Name) VALUES (?1)"),
    )
}

/// Reconciles device contexts by name.
///
/// # Errors
///
/// Returns a store error if a read or insert fails.
pub fn reconcile_contexts(
    store: &mut dyn Store,
    rows: &[ContextRow],
) -> ReplicationResult<Reconciled> {
    reconcile_named(
        store,
        EntityKind::Context,
        rows.iter().map(|row| (row.id, row.name.clone())),
    )
}

/// Reconciles device steps by name.
///
/// # Errors
///
/// Returns a store error if a read or insert fails.
pub fn reconcile_steps(store: &mut dyn Store, rows: &[StepRow]) -> ReplicationResult<Reconciled> {
    reconcile_named(
        store,
        EntityKind::Step,
        rows.iter().map(|row| (row.id, row.name.clone())),
    )
}

/// Reconciles device exceptions by exact content.
///
/// # Errors
///
/// Returns a store error if a read or insert fails.
pub fn reconcile_exceptions(
    store: &mut dyn Store,
    rows: &[ExceptionRow],
) -> ReplicationResult<Reconciled> {
    if rows.is_empty() {
        return Ok(Reconciled::empty(EntityKind::Exception));
    }
    let mut catalog = load_exception_catalog(store)?;
    let candidates = rows.iter().map(|row| Candidate {
        device_id: row.id,
        key: row.content.clone(),
        params: vec![Value::from(row.content.as_str())],
    });
    reconcile(
        store,
        &mut catalog,
        EntityKind::Exception,
        candidates,
        "INSERT INTO Exception (Content) VALUES (?1)",
    )
}

/// Reconciles device features by name within their server context.
///
/// # Errors
///
/// Returns [`crate::ReplicationError::UnresolvedReference`] if a feature
/// names a context the payload did not carry, or a store error.
pub fn reconcile_features(
    store: &mut dyn Store,
    rows: &[FeatureRow],
    contexts: &IdMap,
) -> ReplicationResult<Reconciled> {
    if rows.is_empty() {
        return Ok(Reconciled::empty(EntityKind::Feature));
    }
    let candidates = rows
        .iter()
        .map(|row| {
            let context_id = contexts.resolve(row.context_id)?;
            Ok(Candidate {
                device_id: row.id,
                key: FeatureKey::new(context_id, &row.name),
                params: vec![Value::from(row.name.as_str()), Value::from(context_id)],
            })
        })
        .collect::<ReplicationResult<Vec<_>>>()?;

    let mut catalog = load_feature_catalog(store)?;
    reconcile(
        store,
        &mut catalog,
        EntityKind::Feature,
        candidates,
        "INSERT INTO Feature (Name, ContextId) VALUES (?1, ?2)",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReplicationError;
    use usagelog_store::{create_schema, SchemaProfile, SqliteStore};

    fn server() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        create_schema(&mut store, SchemaProfile::Tagged).unwrap();
        store
    }

    fn count(store: &mut SqliteStore, table: &str) -> i64 {
        store
            .query_scalar(&format!("SELECT COUNT(*) FROM {table}"), &[])
            .unwrap()
            .unwrap()
    }

    fn context(id: i64, name: &str) -> ContextRow {
        ContextRow {
            id,
            name: name.into(),
        }
    }

    fn feature(id: i64, name: &str, context_id: i64) -> FeatureRow {
        FeatureRow {
            id,
            name: name.into(),
            context_id,
        }
    }

    fn candidate(device_id: i64, name: &str) -> Candidate<NameKey> {
        Candidate {
            device_id,
            key: NameKey::new(name),
            params: vec![Value::from(name)],
        }
    }

    fn counts(created: usize, reused: usize) -> KindCounts {
        KindCounts { created, reused }
    }

    #[test]
    fn empty_input_issues_nothing() {
        let mut store = usagelog_store::RecordingStore::new(server());
        let out = reconcile_contexts(&mut store, &[]).unwrap();
        assert!(out.ids.is_empty());
        assert_eq!(out.counts, KindCounts::default());
        assert!(store.statements().is_empty());
    }

    #[test]
    fn duplicates_collapse_to_one_insert() {
        let mut store = server();
        let rows = vec![context(1, "Agenda"), context(2, "AGENDA"), context(3, "agenda")];

        let out = reconcile_contexts(&mut store, &rows).unwrap();
        assert_eq!(out.counts, counts(1, 2));
        assert_eq!(count(&mut store, "Context"), 1);

        let server_id = out.ids.resolve(1).unwrap();
        assert_eq!(out.ids.resolve(2).unwrap(), server_id);
        assert_eq!(out.ids.resolve(3).unwrap(), server_id);
    }

    #[test]
    fn existing_rows_are_reused() {
        let mut store = server();
        store
            .execute("INSERT INTO Step (Name) VALUES (?1)", &[Value::from("Save")])
            .unwrap();

        let rows = vec![
            StepRow {
                id: 7,
                name: "save".into(),
            },
            StepRow {
                id: 8,
                name: "Open".into(),
            },
        ];
        let out = reconcile_steps(&mut store, &rows).unwrap();
        assert_eq!(out.counts, counts(1, 1));
        assert_eq!(out.ids.resolve(7).unwrap(), 1);
        assert_eq!(out.ids.resolve(8).unwrap(), 2);
    }

    #[test]
    fn exceptions_match_exact_content() {
        let mut store = server();
        let rows = ["Timeout", "timeout", "Timeout"]
            .into_iter()
            .zip(1..)
            .map(|(content, id)| ExceptionRow {
                id,
                content: content.into(),
            })
            .collect::<Vec<_>>();
        let out = reconcile_exceptions(&mut store, &rows).unwrap();
        assert_eq!(out.counts, counts(2, 1));
        assert_eq!(count(&mut store, "Exception"), 2);
        assert_eq!(out.ids.resolve(1).unwrap(), out.ids.resolve(3).unwrap());
        assert_ne!(out.ids.resolve(1).unwrap(), out.ids.resolve(2).unwrap());
    }

    #[test]
    fn features_scoped_by_context() {
        let mut store = server();
        let contexts = reconcile_contexts(
            &mut store,
            &[context(1, "Agenda"), context(2, "Contacts")],
        )
        .unwrap();

        let rows = vec![
            feature(10, "Open", 1),
            feature(11, "Open", 2),
            feature(12, "OPEN", 1),
        ];
        let out = reconcile_features(&mut store, &rows, &contexts.ids).unwrap();
        assert_eq!(out.counts, counts(2, 1));
        assert_ne!(out.ids.resolve(10).unwrap(), out.ids.resolve(11).unwrap());
        assert_eq!(out.ids.resolve(10).unwrap(), out.ids.resolve(12).unwrap());
    }

    #[test]
    fn feature_with_unknown_context_fails() {
        let mut store = server();
        let contexts = IdMap::new(EntityKind::Context);
        let rows = vec![feature(10, "Open", 99)];

        let err = reconcile_features(&mut store, &rows, &contexts).unwrap_err();
        assert!(matches!(
            err,
            ReplicationError::UnresolvedReference {
                kind: EntityKind::Context,
                device_id: 99
            }
        ));
        assert_eq!(count(&mut store, "Feature"), 0);
    }

    #[test]
    fn generic_reconcile_updates_catalog() {
        let mut store = server();
        let mut catalog = Catalog::new();
        let candidates = vec![candidate(1, "Agenda"), candidate(2, "agenda")];
        let out = reconcile(
            &mut store,
            &mut catalog,
            EntityKind::Context,
            candidates,
            "INSERT INTO Context (Name) VALUES (?1)",
        )
        .unwrap();
        assert_eq!(out.counts.created, 1);
        assert_eq!(catalog.get(&NameKey::new("AGENDA")), Some(1));
        assert_eq!(out.ids.resolve(2).unwrap(), 1);
    }
}
