//! Benchmark utilities.

use usagelog_codec::{ContextRow, FeatureRow, Snapshot};
use usagelog_testkit::snapshot_with_facts;

/// Generate a snapshot with `facts` rows in every fact section.
pub fn fact_heavy(facts: usize) -> Snapshot {
    snapshot_with_facts(facts)
}

/// Generate a snapshot with `contexts` contexts, each owning one feature.
///
/// Every name is distinct, so a first run against an empty server creates
/// one reference row per record.
pub fn reference_heavy(contexts: usize) -> Snapshot {
    let mut snapshot = snapshot_with_facts(0);
    snapshot.feature_exception_entries.clear();
    snapshot.contexts = (0..contexts)
        .map(|i| ContextRow {
            id: i as i64 + 1,
            name: format!("Context {i}"),
        })
        .collect();
    snapshot.features = (0..contexts)
        .map(|i| FeatureRow {
            id: i as i64 + 1,
            name: format!("Feature {i}"),
            context_id: i as i64 + 1,
        })
        .collect();
    snapshot
}
