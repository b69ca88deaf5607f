//! Replication coordinator.
//!
//! A run merges one device snapshot into the server inside a single
//! transaction, in dependency order:
//!
//! 1. Version, then User (refreshed on every run)
//! 2. Contexts, Steps, Exceptions
//! 3. Features (scoped by the server context)
//! 4. FeatureEntries, then FeatureEntrySteps and FeatureExceptionEntries
//! 5. The `LastChanged` marker
//!
//! Any failure rolls the whole run back.

use crate::batch::{insert_batched, FactTable};
use crate::cancel::{CancelHandle, RunGuard};
use crate::catalog::{IdMap, NameKey};
use crate::config::ReplicationConfig;
use crate::error::{EntityKind, ReplicationError, ReplicationResult};
use crate::reconcile::{
    load_name_catalog, reconcile_contexts, reconcile_exceptions, reconcile_features,
    reconcile_steps, KindCounts,
};
use std::fmt;
use usagelog_codec::{unpack, Snapshot, Ticks};
use usagelog_store::{Store, TransactionalStore, Value};
use uuid::Uuid;

/// Summary of a committed replication run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Identifier of this run, as logged.
    pub run_id: Uuid,
    /// Run time stamped on the User row and the change marker.
    pub run_time: Ticks,
    /// Server id of the replicating user.
    pub user_id: i64,
    /// Whether the User row was created by this run.
    pub user_created: bool,
    /// Server id of the reported version.
    pub version_id: i64,
    /// Whether the Version row was created by this run.
    pub version_created: bool,
    /// Context reconciliation counts.
    pub contexts: KindCounts,
    /// Step reconciliation counts.
    pub steps: KindCounts,
    /// Exception reconciliation counts.
    pub exceptions: KindCounts,
    /// Feature reconciliation counts.
    pub features: KindCounts,
    /// FeatureEntry rows inserted.
    pub feature_entries: usize,
    /// FeatureEntryStep rows inserted.
    pub feature_entry_steps: usize,
    /// FeatureExceptionEntry rows inserted.
    pub feature_exception_entries: usize,
    /// Multi-row fact insert statements issued.
    pub insert_statements: usize,
}

impl ReplicationReport {
    fn new(run_id: Uuid, run_time: Ticks) -> Self {
        Self {
            run_id,
            run_time,
            user_id: 0,
            user_created: false,
            version_id: 0,
            version_created: false,
            contexts: KindCounts::default(),
            steps: KindCounts::default(),
            exceptions: KindCounts::default(),
            features: KindCounts::default(),
            feature_entries: 0,
            feature_entry_steps: 0,
            feature_exception_entries: 0,
            insert_statements: 0,
        }
    }

    /// Returns the number of fact rows inserted.
    pub fn facts_inserted(&self) -> usize {
        self.feature_entries + self.feature_entry_steps + self.feature_exception_entries
    }

    /// Returns the number of reference rows created.
    pub fn references_created(&self) -> usize {
        self.contexts.created + self.steps.created + self.exceptions.created + self.features.created
    }
}

impl fmt::Display for ReplicationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} at {}", self.run_id, self.run_time)?;
        writeln!(
            f,
            "  user id {}{}, version id {}{}",
            self.user_id,
            if self.user_created { " (new)" } else { "" },
            self.version_id,
            if self.version_created { " (new)" } else { "" },
        )?;
        for (label, counts) in [
            ("contexts", self.contexts),
            ("steps", self.steps),
            ("exceptions", self.exceptions),
            ("features", self.features),
        ] {
            writeln!(
                f,
                "  {label:<11} created {:>6}  reused {:>6}",
                counts.created, counts.reused
            )?;
        }
        write!(
            f,
            "  facts       entries {}, steps {}, exceptions {} in {} statements",
            self.feature_entries,
            self.feature_entry_steps,
            self.feature_exception_entries,
            self.insert_statements
        )
    }
}

/// Drives replication runs against a transactional store.
///
/// # Example
///
/// ```rust
/// use usagelog_codec::{pack, ContextRow, Snapshot};
/// use usagelog_replication::{ReplicationConfig, Replicator};
/// use usagelog_store::{create_schema, SchemaProfile, SqliteStore};
///
/// let mut store = SqliteStore::open_in_memory().unwrap();
/// create_schema(&mut store, SchemaProfile::Tagged).unwrap();
///
/// let mut snapshot = Snapshot::new();
/// snapshot.contexts.push(ContextRow {
///     id: 1,
///     name: "Agenda".into(),
/// });
/// let payload = pack(&snapshot).unwrap();
///
/// let replicator = Replicator::new(ReplicationConfig::default()).unwrap();
/// let report = replicator.replicate_run("alice", "1.2.0", &mut store, &payload).unwrap();
/// assert_eq!(report.contexts.created, 1);
/// ```
#[derive(Debug, Clone)]
pub struct Replicator {
    config: ReplicationConfig,
    cancel: CancelHandle,
}

impl Replicator {
    /// Creates a replicator.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::InvalidConfig`] if the configuration
    /// does not validate.
    pub fn new(config: ReplicationConfig) -> ReplicationResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelHandle::new(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Returns a handle that cancels this replicator's runs.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Replicates a packed payload, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload does not decode, carries a
    /// non-finite time spent, references a row it does not carry, the
    /// store fails, or the run is cancelled or times out. Nothing is
    /// committed on error.
    pub fn replicate_run<S: TransactionalStore>(
        &self,
        user_name: &str,
        version_label: &str,
        store: &mut S,
        payload: &[u8],
    ) -> ReplicationResult<ReplicationReport> {
        self.replicate_run_at(user_name, version_label, store, payload, Ticks::now())
    }

    /// Replicates a packed payload with an explicit run time.
    ///
    /// The payload is decoded before the transaction opens, so a malformed
    /// payload never touches the store.
    ///
    /// # Errors
    ///
    /// See [`Replicator::replicate_run`].
    pub fn replicate_run_at<S: TransactionalStore>(
        &self,
        user_name: &str,
        version_label: &str,
        store: &mut S,
        payload: &[u8],
        run_time: Ticks,
    ) -> ReplicationResult<ReplicationReport> {
        let snapshot = unpack(payload).map_err(|err| {
            tracing::warn!(
                user = user_name,
                payload_len = payload.len(),
                error = %err,
                "payload rejected"
            );
            ReplicationError::from(err)
        })?;
        self.replicate_snapshot_at(user_name, version_label, store, &snapshot, run_time)
    }

    /// Replicates an already decoded snapshot.
    ///
    /// Fact rows with a non-finite time spent are rejected before the
    /// transaction opens.
    ///
    /// # Errors
    ///
    /// See [`Replicator::replicate_run`].
    pub fn replicate_snapshot_at<S: TransactionalStore>(
        &self,
        user_name: &str,
        version_label: &str,
        store: &mut S,
        snapshot: &Snapshot,
        run_time: Ticks,
    ) -> ReplicationResult<ReplicationReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "replication_run",
            user = user_name,
            version = version_label,
            %run_id
        );
        let _enter = span.enter();

        if let Err(err) = check_snapshot(snapshot) {
            tracing::warn!(error = %err, "payload rejected");
            return Err(err);
        }

        tracing::debug!(records = snapshot.total_records(), "run started");
        let guard = RunGuard::new(self.cancel.clone(), self.config.timeout);

        let result: ReplicationResult<ReplicationReport> = store.transaction(|txn| {
            let mut run = Run {
                config: &self.config,
                guard: &guard,
                report: ReplicationReport::new(run_id, run_time),
            };
            run.apply(txn, user_name, version_label, snapshot)?;
            Ok(run.report)
        });

        match &result {
            Ok(report) => tracing::info!(
                references_created = report.references_created(),
                facts = report.facts_inserted(),
                statements = report.insert_statements,
                "run committed"
            ),
            Err(err) => tracing::warn!(error = %err, "run rolled back"),
        }
        result
    }
}

/// State of one run inside its transaction.
struct Run<'a> {
    config: &'a ReplicationConfig,
    guard: &'a RunGuard,
    report: ReplicationReport,
}

impl Run<'_> {
    fn apply(
        &mut self,
        store: &mut dyn Store,
        user_name: &str,
        version_label: &str,
        snapshot: &Snapshot,
    ) -> ReplicationResult<()> {
        let run_time = self.report.run_time;

        self.guard.checkpoint("version")?;
        let (version_id, version_created) = resolve_version(store, version_label)?;
        self.report.version_id = version_id;
        self.report.version_created = version_created;

        self.guard.checkpoint("user")?;
        let (user_id, user_created) = refresh_user(store, user_name, version_id, run_time)?;
        self.report.user_id = user_id;
        self.report.user_created = user_created;

        self.guard.checkpoint("references")?;
        let contexts = reconcile_contexts(store, &snapshot.contexts)?;
        let steps = reconcile_steps(store, &snapshot.steps)?;
        let exceptions = reconcile_exceptions(store, &snapshot.exceptions)?;
        self.report.contexts = contexts.counts;
        self.report.steps = steps.counts;
        self.report.exceptions = exceptions.counts;

        self.guard.checkpoint("features")?;
        let features = reconcile_features(store, &snapshot.features, &contexts.ids)?;
        self.report.features = features.counts;

        self.guard.checkpoint("facts")?;
        let entries = self.insert_entries(store, snapshot, &features.ids)?;
        self.insert_entry_steps(store, snapshot, &entries, &steps.ids)?;
        self.insert_exception_entries(store, snapshot, &exceptions.ids, &features.ids)?;

        self.guard.checkpoint("marker")?;
        touch_marker(store, run_time)?;
        Ok(())
    }

    fn tags(&self) -> Option<[Value; 2]> {
        self.config.profile.tags_facts().then(|| {
            [
                Value::Integer(self.report.user_id),
                Value::Integer(self.report.version_id),
            ]
        })
    }

    fn insert_entries(
        &mut self,
        store: &mut dyn Store,
        snapshot: &Snapshot,
        features: &IdMap,
    ) -> ReplicationResult<IdMap> {
        let tags = self.tags();
        let rows = snapshot
            .feature_entries
            .iter()
            .map(|entry| {
                let mut row = vec![
                    Value::Real(entry.time_spent),
                    Value::from(entry.details.as_str()),
                    Value::Integer(entry.created_at.as_i64()),
                    Value::Integer(features.resolve(entry.feature_id)?),
                ];
                row.extend(tags.iter().flatten().cloned());
                Ok(row)
            })
            .collect::<ReplicationResult<Vec<_>>>()?;

        let table = FactTable::feature_entry(self.config.profile);
        let outcome = insert_batched(store, &table, rows, self.config.batch_size, self.guard)?;

        let mut entries = IdMap::new(EntityKind::FeatureEntry);
        for (entry, server_id) in snapshot.feature_entries.iter().zip(&outcome.ids) {
            entries.insert(entry.id, *server_id);
        }
        self.report.feature_entries = outcome.rows;
        self.report.insert_statements += outcome.statements;
        Ok(entries)
    }

    fn insert_entry_steps(
        &mut self,
        store: &mut dyn Store,
        snapshot: &Snapshot,
        entries: &IdMap,
        steps: &IdMap,
    ) -> ReplicationResult<()> {
        let rows = snapshot
            .feature_entry_steps
            .iter()
            .map(|step| {
                Ok(vec![
                    Value::Real(step.time_spent),
                    Value::from(step.details.as_str()),
                    Value::Integer(entries.resolve(step.feature_entry_id)?),
                    Value::Integer(steps.resolve(step.feature_step_id)?),
                ])
            })
            .collect::<ReplicationResult<Vec<_>>>()?;

        let table = FactTable::feature_entry_step();
        let outcome = insert_batched(store, &table, rows, self.config.batch_size, self.guard)?;
        self.report.feature_entry_steps = outcome.rows;
        self.report.insert_statements += outcome.statements;
        Ok(())
    }

    fn insert_exception_entries(
        &mut self,
        store: &mut dyn Store,
        snapshot: &Snapshot,
        exceptions: &IdMap,
        features: &IdMap,
    ) -> ReplicationResult<()> {
        let tags = self.tags();
        let rows = snapshot
            .feature_exception_entries
            .iter()
            .map(|entry| {
                let mut row = vec![
                    Value::Integer(exceptions.resolve(entry.exception_id)?),
                    Value::Integer(entry.created_at.as_i64()),
                    Value::Integer(features.resolve(entry.feature_id)?),
                ];
                row.extend(tags.iter().flatten().cloned());
                Ok(row)
            })
            .collect::<ReplicationResult<Vec<_>>>()?;

        let table = FactTable::feature_exception_entry(self.config.profile);
        let outcome = insert_batched(store, &table, rows, self.config.batch_size, self.guard)?;
        self.report.feature_exception_entries = outcome.rows;
        self.report.insert_statements += outcome.statements;
        Ok(())
    }
}

/// Rejects fact rows whose values the server columns cannot hold.
///
/// SQLite binds NaN as NULL, which a `NOT NULL` column refuses mid-run,
/// so such payloads are turned away before the transaction opens.
fn check_snapshot(snapshot: &Snapshot) -> ReplicationResult<()> {
    check_time_spent(
        "FeatureEntry",
        snapshot.feature_entries.iter().map(|e| e.time_spent),
    )?;
    check_time_spent(
        "FeatureEntryStep",
        snapshot.feature_entry_steps.iter().map(|s| s.time_spent),
    )
}

fn check_time_spent(
    table: &'static str,
    values: impl Iterator<Item = f64>,
) -> ReplicationResult<()> {
    for (index, value) in values.enumerate() {
        if !value.is_finite() {
            return Err(ReplicationError::InvalidTimeSpent {
                table,
                index,
                value,
            });
        }
    }
    Ok(())
}

/// Looks a name up with the same case folding as the other reference kinds.
///
/// SQL `NOCASE` folds ASCII only, so the lookup goes through a
/// [`NameKey`] catalog instead of a `WHERE Name = ?` query.
fn find_by_name(store: &mut dyn Store, table: &str, name: &str) -> ReplicationResult<Option<i64>> {
    Ok(load_name_catalog(store, table)?.get(&NameKey::new(name)))
}

/// Finds or creates the Version row for a label.
fn resolve_version(store: &mut dyn Store, label: &str) -> ReplicationResult<(i64, bool)> {
    if let Some(id) = find_by_name(store, "Version", label)? {
        return Ok((id, false));
    }
    store.execute("INSERT INTO Version (Name) VALUES (?1)", &[Value::from(label)])?;
    Ok((store.last_insert_id()?, true))
}

/// Finds or creates the User row and stamps it with this run.
fn refresh_user(
    store: &mut dyn Store,
    name: &str,
    version_id: i64,
    run_time: Ticks,
) -> ReplicationResult<(i64, bool)> {
    match find_by_name(store, "\"User\"", name)? {
        Some(id) => {
            store.execute(
                "UPDATE \"User\" SET LastReplicatedAt = ?1, VersionId = ?2 WHERE Id = ?3",
                &[
                    Value::Integer(run_time.as_i64()),
                    Value::Integer(version_id),
                    Value::Integer(id),
                ],
            )?;
            Ok((id, false))
        }
        None => {
            store.execute(
                "INSERT INTO \"User\" (Name, LastReplicatedAt, VersionId) VALUES (?1, ?2, ?3)",
                &[
                    Value::from(name),
                    Value::Integer(run_time.as_i64()),
                    Value::Integer(version_id),
                ],
            )?;
            Ok((store.last_insert_id()?, true))
        }
    }
}

/// Sets the change marker to the run time, creating it on first use.
fn touch_marker(store: &mut dyn Store, run_time: Ticks) -> ReplicationResult<()> {
    let changed = store.execute(
        "UPDATE LastChanged SET ChangedAt = ?1",
        &[Value::Integer(run_time.as_i64())],
    )?;
    if changed == 0 {
        store.execute(
            "INSERT INTO LastChanged (ChangedAt) VALUES (?1)",
            &[Value::Integer(run_time.as_i64())],
        )?;
    }
    Ok(())
}
