//! Multi-row fact inserts.

use crate::cancel::RunGuard;
use crate::error::{ReplicationError, ReplicationResult};
use usagelog_store::{SchemaProfile, Store, Value};

/// A fact table and the columns a run writes into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactTable {
    /// Table name.
    pub name: &'static str,
    /// Column names, in parameter order.
    pub columns: Vec<&'static str>,
}

impl FactTable {
    fn with_tags(
        name: &'static str,
        mut columns: Vec<&'static str>,
        profile: SchemaProfile,
    ) -> Self {
        if profile.tags_facts() {
            columns.extend(["UserId", "VersionId"]);
        }
        Self { name, columns }
    }

    /// The `FeatureEntry` layout for a profile.
    pub fn feature_entry(profile: SchemaProfile) -> Self {
        Self::with_tags(
            "FeatureEntry",
            vec!["TimeSpent", "Details", "CreatedAt", "FeatureId"],
            profile,
        )
    }

    /// The `FeatureEntryStep` layout.
    pub fn feature_entry_step() -> Self {
        Self {
            name: "FeatureEntryStep",
            columns: vec!["TimeSpent", "Details", "FeatureEntryId", "FeatureStepId"],
        }
    }

    /// The `FeatureExceptionEntry` layout for a profile.
    pub fn feature_exception_entry(profile: SchemaProfile) -> Self {
        Self::with_tags(
            "FeatureExceptionEntry",
            vec!["ExceptionId", "CreatedAt", "FeatureId"],
            profile,
        )
    }

    /// Builds an insert of `rows` rows with numbered placeholders.
    ///
    /// ```
    /// use usagelog_replication::FactTable;
    ///
    /// let sql = FactTable::feature_entry_step().insert_sql(2);
    /// assert_eq!(
    ///     sql,
    ///     "INSERT INTO FeatureEntryStep (TimeSpent, Details, FeatureEntryId, FeatureStepId) \
    ///      VALUES (?1, ?2, ?3, ?4), (?5, ?6, ?7, ?8)"
    /// );
    /// ```
    pub fn insert_sql(&self, rows: usize) -> String {
        let width = self.columns.len();
        let tuples: Vec<String> = (0..rows)
            .map(|row| {
                let placeholders: Vec<String> = (1..=width)
                    .map(|col| format!("?{}", row * width + col))
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.name,
            self.columns.join(", "),
            tuples.join(", ")
        )
    }
}

/// Result of inserting one fact table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Rows inserted.
    pub rows: usize,
    /// Insert statements issued.
    pub statements: usize,
    /// Generated ids, one per row in input order.
    pub ids: Vec<i64>,
}

/// Inserts fact rows in groups of `batch_size`.
///
/// Issues exactly `ceil(rows / batch_size)` statements; the remainder goes
/// into one smaller final statement. Generated ids are recovered from the
/// store's contiguous-id guarantee for multi-row inserts.
pub(crate) fn insert_batched(
    store: &mut dyn Store,
    table: &FactTable,
    rows: Vec<Vec<Value>>,
    batch_size: usize,
    guard: &RunGuard,
) -> ReplicationResult<BatchOutcome> {
    let mut outcome = BatchOutcome {
        rows: rows.len(),
        statements: 0,
        ids: Vec::with_capacity(rows.len()),
    };
    let full_sql = table.insert_sql(batch_size);

    for chunk in rows.chunks(batch_size) {
        guard.checkpoint(table.name)?;

        let sql = if chunk.len() == batch_size {
            full_sql.clone()
        } else {
            table.insert_sql(chunk.len())
        };
        let params = chunk.concat();

        let affected = store.execute(&sql, &params)?;
        if affected != chunk.len() {
            return Err(ReplicationError::IdRangeMismatch {
                table: table.name,
                expected: chunk.len(),
                affected,
            });
        }
        let last = store.last_insert_id()?;
        let first = last - chunk.len() as i64 + 1;
        outcome.ids.extend(first..=last);
        outcome.statements += 1;

        tracing::debug!(table = table.name, rows = chunk.len(), last_id = last, "batch inserted");
    }

    Ok(outcome)
}
