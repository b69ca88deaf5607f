//! Property-based test generators using proptest.
//!
//! Two families of snapshot strategies:
//! - [`snapshot_strategy`] produces arbitrary rows for codec tests; ids are
//!   unconstrained and references may dangle
//! - [`consistent_snapshot_strategy`] produces snapshots whose references
//!   all resolve inside the snapshot, for replication tests

use proptest::prelude::*;
use proptest::sample::Index;
use usagelog_codec::{
    ContextRow, ExceptionRow, FeatureEntryRow, FeatureEntryStepRow, FeatureExceptionEntryRow,
    FeatureRow, Snapshot, StepRow, Ticks,
};

/// Largest tick value a device clock produces (9999-12-31T23:59:59.9999999).
pub const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

/// Strategy for strings every character of which fits in one wire byte.
pub fn latin1_string_strategy(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
        .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
}

/// Strategy for context, step, and feature names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9]{0,15}").expect("Invalid regex")
}

/// Strategy for tick timestamps.
pub fn ticks_strategy() -> impl Strategy<Value = Ticks> {
    (0..=MAX_TICKS).prop_map(Ticks)
}

/// Strategy for finite time-spent values.
pub fn time_spent_strategy() -> impl Strategy<Value = f64> {
    0.0f64..86_400.0
}

/// Strategy for arbitrary snapshots with up to `max_per_section` rows in
/// every section.
pub fn snapshot_strategy(max_per_section: usize) -> impl Strategy<Value = Snapshot> {
    let n = 0..=max_per_section;
    (
        prop::collection::vec(
            (any::<i64>(), latin1_string_strategy(24))
                .prop_map(|(id, name)| ContextRow { id, name }),
            n.clone(),
        ),
        prop::collection::vec(
            (any::<i64>(), latin1_string_strategy(24)).prop_map(|(id, name)| StepRow { id, name }),
            n.clone(),
        ),
        prop::collection::vec(
            (any::<i64>(), latin1_string_strategy(200))
                .prop_map(|(id, content)| ExceptionRow { id, content }),
            n.clone(),
        ),
        prop::collection::vec(
            (any::<i64>(), latin1_string_strategy(24), any::<i64>()).prop_map(
                |(id, name, context_id)| FeatureRow {
                    id,
                    name,
                    context_id,
                },
            ),
            n.clone(),
        ),
        prop::collection::vec(
            (
                any::<i64>(),
                time_spent_strategy(),
                latin1_string_strategy(40),
                ticks_strategy(),
                any::<i64>(),
            )
                .prop_map(|(id, time_spent, details, created_at, feature_id)| {
                    FeatureEntryRow {
                        id,
                        time_spent,
                        details,
                        created_at,
                        feature_id,
                    }
                }),
            n.clone(),
        ),
        prop::collection::vec(
            (
                time_spent_strategy(),
                latin1_string_strategy(40),
                any::<i64>(),
                any::<i64>(),
            )
                .prop_map(|(time_spent, details, feature_entry_id, feature_step_id)| {
                    FeatureEntryStepRow {
                        time_spent,
                        details,
                        feature_entry_id,
                        feature_step_id,
                    }
                }),
            n.clone(),
        ),
        prop::collection::vec(
            (any::<i64>(), ticks_strategy(), any::<i64>()).prop_map(
                |(exception_id, created_at, feature_id)| FeatureExceptionEntryRow {
                    exception_id,
                    created_at,
                    feature_id,
                },
            ),
            n,
        ),
    )
        .prop_map(
            |(
                contexts,
                steps,
                exceptions,
                features,
                feature_entries,
                feature_entry_steps,
                feature_exception_entries,
            )| Snapshot {
                contexts,
                steps,
                exceptions,
                features,
                feature_entries,
                feature_entry_steps,
                feature_exception_entries,
            },
        )
}

/// Device id assigned to the `index`-th row of a reference section.
///
/// Spaced out so device ids never coincide with fresh server ids.
fn device_id(index: usize, stride: i64) -> i64 {
    (index as i64 + 1) * stride
}

/// Strategy for referentially consistent snapshots with up to `max_facts`
/// rows in every fact section.
///
/// Names repeat freely, so the same natural key often appears under more
/// than one device id.
pub fn consistent_snapshot_strategy(max_facts: usize) -> impl Strategy<Value = Snapshot> {
    (
        prop::collection::vec(name_strategy(), 1..4),
        prop::collection::vec(name_strategy(), 1..4),
        prop::collection::vec(latin1_string_strategy(40), 1..4),
        prop::collection::vec((name_strategy(), any::<Index>()), 1..6),
        prop::collection::vec(
            (
                time_spent_strategy(),
                latin1_string_strategy(20),
                ticks_strategy(),
                any::<Index>(),
            ),
            0..=max_facts,
        ),
        prop::collection::vec(
            (
                time_spent_strategy(),
                latin1_string_strategy(20),
                any::<Index>(),
                any::<Index>(),
            ),
            0..=max_facts,
        ),
        prop::collection::vec((any::<Index>(), ticks_strategy(), any::<Index>()), 0..=max_facts),
    )
        .prop_map(
            |(contexts, steps, exceptions, features, entries, entry_steps, exception_entries)| {
                let mut snapshot = Snapshot::new();

                snapshot.contexts = contexts
                    .into_iter()
                    .enumerate()
                    .map(|(i, name)| ContextRow {
                        id: device_id(i, 10),
                        name,
                    })
                    .collect();
                snapshot.steps = steps
                    .into_iter()
                    .enumerate()
                    .map(|(i, name)| StepRow {
                        id: device_id(i, 11),
                        name,
                    })
                    .collect();
                snapshot.exceptions = exceptions
                    .into_iter()
                    .enumerate()
                    .map(|(i, content)| ExceptionRow {
                        id: device_id(i, 12),
                        content,
                    })
                    .collect();

                let context_count = snapshot.contexts.len();
                snapshot.features = features
                    .into_iter()
                    .enumerate()
                    .map(|(i, (name, context))| FeatureRow {
                        id: device_id(i, 13),
                        name,
                        context_id: device_id(context.index(context_count), 10),
                    })
                    .collect();

                let feature_count = snapshot.features.len();
                snapshot.feature_entries = entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, (time_spent, details, created_at, feature))| FeatureEntryRow {
                        id: device_id(i, 7),
                        time_spent,
                        details,
                        created_at,
                        feature_id: device_id(feature.index(feature_count), 13),
                    })
                    .collect();

                let entry_count = snapshot.feature_entries.len();
                let step_count = snapshot.steps.len();
                if entry_count > 0 {
                    snapshot.feature_entry_steps = entry_steps
                        .into_iter()
                        .map(|(time_spent, details, entry, step)| FeatureEntryStepRow {
                            time_spent,
                            details,
                            feature_entry_id: device_id(entry.index(entry_count), 7),
                            feature_step_id: device_id(step.index(step_count), 11),
                        })
                        .collect();
                }

                let exception_count = snapshot.exceptions.len();
                snapshot.feature_exception_entries = exception_entries
                    .into_iter()
                    .map(|(exception, created_at, feature)| FeatureExceptionEntryRow {
                        exception_id: device_id(exception.index(exception_count), 12),
                        created_at,
                        feature_id: device_id(feature.index(feature_count), 13),
                    })
                    .collect();

                snapshot
            },
        )
}

/// Proptest configuration used across the workspace's property tests.
///
/// Snapshot strategies build whole graphs per case, so the case count is kept low.
#[must_use]
pub fn quick_config() -> ProptestConfig {
    ProptestConfig {
        cases: 32,
        max_shrink_iters: 100,
        ..ProptestConfig::default()
    }
}
