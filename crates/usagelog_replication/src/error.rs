//! Error types for replication runs.

use std::fmt;
use thiserror::Error;
use usagelog_codec::CodecError;
use usagelog_store::StoreError;

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Entity kinds a device row can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A feature context.
    Context,
    /// A named step.
    Step,
    /// An exception text.
    Exception,
    /// A feature.
    Feature,
    /// A feature use.
    FeatureEntry,
}

impl EntityKind {
    /// Returns the server table holding this kind.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Context => "Context",
            EntityKind::Step => "Step",
            EntityKind::Exception => "Exception",
            EntityKind::Feature => "Feature",
            EntityKind::FeatureEntry => "FeatureEntry",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// Errors that can abort a replication run.
///
/// Every error rolls the run's transaction back; no partial apply is ever
/// committed.
#[derive(Error, Debug)]
pub enum ReplicationError {
    /// The payload is malformed. Raised before any store access.
    #[error("payload decode failed: {0}")]
    Decode(#[from] CodecError),

    /// A device row names a device id the payload never defined.
    #[error("unresolved {kind} reference to device id {device_id}")]
    UnresolvedReference {
        /// Kind of the referenced row.
        kind: EntityKind,
        /// The dangling device-local id.
        device_id: i64,
    },

    /// A fact row carries a time spent the server cannot store.
    /// Raised before any store access.
    #[error("{table} row {index} has non-finite time spent {value}")]
    InvalidTimeSpent {
        /// Target table.
        table: &'static str,
        /// Position of the row in its payload section.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// The store failed a statement.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The replication configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The run was cancelled through its cancel handle.
    #[error("replication cancelled")]
    Cancelled,

    /// The run exceeded its configured timeout.
    #[error("replication timed out")]
    Timeout,

    /// A batched insert changed a different number of rows than it sent,
    /// so generated ids cannot be attributed.
    #[error("{table} insert of {expected} rows changed {affected} rows")]
    IdRangeMismatch {
        /// Target table.
        table: &'static str,
        /// Rows sent in the statement.
        expected: usize,
        /// Rows the store reported as changed.
        affected: usize,
    },
}

impl ReplicationError {
    /// Creates an unresolved-reference error.
    pub fn unresolved(kind: EntityKind, device_id: i64) -> Self {
        Self::UnresolvedReference { kind, device_id }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Returns true if the payload references a row it does not carry.
    pub fn is_referential(&self) -> bool {
        matches!(self, ReplicationError::UnresolvedReference { .. })
    }

    /// Returns true if the payload could not be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, ReplicationError::Decode(_))
    }

    /// Returns true if the payload was turned away before any store access.
    pub fn is_rejected_payload(&self) -> bool {
        matches!(
            self,
            ReplicationError::Decode(_) | ReplicationError::InvalidTimeSpent { .. }
        )
    }

    /// Returns true if the store failed.
    pub fn is_store(&self) -> bool {
        matches!(self, ReplicationError::Store(_))
    }

    /// Returns true if the run was stopped by cancellation or timeout.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ReplicationError::Cancelled | ReplicationError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(ReplicationError::unresolved(EntityKind::Feature, 7).is_referential());
        assert!(ReplicationError::from(CodecError::TrailingBytes { count: 1 }).is_decode());
        assert!(ReplicationError::from(StoreError::NoGeneratedId).is_store());
        assert!(ReplicationError::Cancelled.is_interrupted());
        assert!(ReplicationError::Timeout.is_interrupted());
        assert!(!ReplicationError::invalid_config("x").is_referential());

        let err = ReplicationError::InvalidTimeSpent {
            table: "FeatureEntry",
            index: 0,
            value: f64::NAN,
        };
        assert!(err.is_rejected_payload());
        assert!(!err.is_decode());
        assert_eq!(
            err.to_string(),
            "FeatureEntry row 0 has non-finite time spent NaN"
        );
    }

    #[test]
    fn error_display() {
        let err = ReplicationError::unresolved(EntityKind::Context, 42);
        assert_eq!(
            err.to_string(),
            "unresolved Context reference to device id 42"
        );

        let err = ReplicationError::IdRangeMismatch {
            table: "FeatureEntry",
            expected: 3,
            affected: 2,
        };
        assert!(err.to_string().contains("FeatureEntry"));
        assert!(err.to_string().contains('3'));
    }
}
