//! Device row model.
//!
//! Every identifier carried by these rows is device-local: it is only
//! meaningful inside the store of the device that produced the snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 100 ns ticks per second.
const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 0001-01-01T00:00:00Z and the Unix epoch.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// A tick timestamp: 100 ns intervals since 0001-01-01T00:00:00 UTC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ticks(pub i64);

impl Ticks {
    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts a UTC timestamp, saturating outside the `i64` tick range.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let sub_second = i64::from(dt.timestamp_subsec_nanos()) / 100;
        Self(
            dt.timestamp()
                .saturating_mul(TICKS_PER_SECOND)
                .saturating_add(sub_second)
                .saturating_add(UNIX_EPOCH_TICKS),
        )
    }

    /// Converts back to a UTC timestamp, if chrono can represent it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let since_epoch = self.0.checked_sub(UNIX_EPOCH_TICKS)?;
        let secs = since_epoch.div_euclid(TICKS_PER_SECOND);
        // rem_euclid is in [0, TICKS_PER_SECOND), so the product fits in u32
        let nanos = (since_epoch.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    /// Returns the raw tick count.
    pub const fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<DateTime<Utc>> for Ticks {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_datetime(dt)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{} ticks", self.0),
        }
    }
}

/// The seven payload sections, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Feature contexts (screens, modules).
    Contexts,
    /// Named steps inside a feature entry.
    Steps,
    /// Distinct exception texts.
    Exceptions,
    /// Features, scoped by context.
    Features,
    /// One row per feature use.
    FeatureEntries,
    /// One row per step taken during a feature use.
    FeatureEntrySteps,
    /// One row per exception raised inside a feature.
    FeatureExceptionEntries,
}

impl Section {
    /// All sections in wire order.
    pub const ALL: [Section; 7] = [
        Section::Contexts,
        Section::Steps,
        Section::Exceptions,
        Section::Features,
        Section::FeatureEntries,
        Section::FeatureEntrySteps,
        Section::FeatureExceptionEntries,
    ];

    /// Returns the section name.
    pub fn name(&self) -> &'static str {
        match self {
            Section::Contexts => "Contexts",
            Section::Steps => "Steps",
            Section::Exceptions => "Exceptions",
            Section::Features => "Features",
            Section::FeatureEntries => "FeatureEntries",
            Section::FeatureEntrySteps => "FeatureEntrySteps",
            Section::FeatureExceptionEntries => "FeatureExceptionEntries",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A feature context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRow {
    /// Device-local identifier.
    pub id: i64,
    /// Context name.
    pub name: String,
}

/// A named step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRow {
    /// Device-local identifier.
    pub id: i64,
    /// Step name.
    pub name: String,
}

/// A distinct exception text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionRow {
    /// Device-local identifier.
    pub id: i64,
    /// Full exception content.
    pub content: String,
}

/// A feature, unique by name within its context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Device-local identifier.
    pub id: i64,
    /// Feature name.
    pub name: String,
    /// Device-local context identifier.
    pub context_id: i64,
}

/// One use of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntryRow {
    /// Device-local identifier.
    pub id: i64,
    /// Time spent in the feature.
    pub time_spent: f64,
    /// Free-form details.
    pub details: String,
    /// When the use started.
    pub created_at: Ticks,
    /// Device-local feature identifier.
    pub feature_id: i64,
}

/// One step taken during a feature use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntryStepRow {
    /// Time spent in the step.
    pub time_spent: f64,
    /// Free-form details.
    pub details: String,
    /// Device-local feature entry identifier.
    pub feature_entry_id: i64,
    /// Device-local step identifier.
    pub feature_step_id: i64,
}

/// One exception raised while a feature was in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureExceptionEntryRow {
    /// Device-local exception identifier.
    pub exception_id: i64,
    /// When the exception was raised.
    pub created_at: Ticks,
    /// Device-local feature identifier.
    pub feature_id: i64,
}

/// All not-yet-replicated rows of one device, in local creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Contexts section.
    pub contexts: Vec<ContextRow>,
    /// Steps section.
    pub steps: Vec<StepRow>,
    /// Exceptions section.
    pub exceptions: Vec<ExceptionRow>,
    /// Features section.
    pub features: Vec<FeatureRow>,
    /// Feature entries section.
    pub feature_entries: Vec<FeatureEntryRow>,
    /// Feature entry steps section.
    pub feature_entry_steps: Vec<FeatureEntryStepRow>,
    /// Feature exception entries section.
    pub feature_exception_entries: Vec<FeatureExceptionEntryRow>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in a section.
    pub fn section_len(&self, section: Section) -> usize {
        match section {
            Section::Contexts => self.contexts.len(),
            Section::Steps => self.steps.len(),
            Section::Exceptions => self.exceptions.len(),
            Section::Features => self.features.len(),
            Section::FeatureEntries => self.feature_entries.len(),
            Section::FeatureEntrySteps => self.feature_entry_steps.len(),
            Section::FeatureExceptionEntries => self.feature_exception_entries.len(),
        }
    }

    /// Returns the total number of records across all sections.
    pub fn total_records(&self) -> usize {
        Section::ALL.iter().map(|s| self.section_len(*s)).sum()
    }

    /// Returns true if no section holds a record.
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ticks_unix_epoch() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(Ticks::from_datetime(epoch), Ticks(UNIX_EPOCH_TICKS));
        assert_eq!(Ticks(UNIX_EPOCH_TICKS).to_datetime(), Some(epoch));
    }

    #[test]
    fn ticks_keep_sub_second_precision() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_456_700).unwrap();
        let ticks = Ticks::from(dt);
        assert_eq!(ticks.to_datetime(), Some(dt));
    }

    #[test]
    fn ticks_before_unix_epoch() {
        let dt = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap();
        let ticks = Ticks::from(dt);
        assert_eq!(ticks.as_i64(), UNIX_EPOCH_TICKS - TICKS_PER_SECOND);
        assert_eq!(ticks.to_datetime(), Some(dt));
    }

    #[test]
    fn ticks_zero_is_year_one() {
        let dt = Ticks(0).to_datetime().unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn section_order_and_names() {
        assert_eq!(Section::ALL[0], Section::Contexts);
        assert_eq!(Section::ALL[6], Section::FeatureExceptionEntries);
        assert_eq!(Section::FeatureEntrySteps.to_string(), "FeatureEntrySteps");
    }

    #[test]
    fn snapshot_counts() {
        let mut snapshot = Snapshot::new();
        assert!(snapshot.is_empty());

        snapshot.contexts.push(ContextRow {
            id: 1,
            name: "Agenda".into(),
        });
        snapshot.features.push(FeatureRow {
            id: 1,
            name: "CreateActivity".into(),
            context_id: 1,
        });

        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.total_records(), 2);
        assert_eq!(snapshot.section_len(Section::Features), 1);
        assert_eq!(snapshot.section_len(Section::Steps), 0);
    }

    #[test]
    fn snapshot_json_uses_raw_ticks() {
        let mut snapshot = Snapshot::new();
        snapshot
            .feature_exception_entries
            .push(FeatureExceptionEntryRow {
                exception_id: 3,
                created_at: Ticks(42),
                feature_id: 7,
            });

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"created_at\":42"));

        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
