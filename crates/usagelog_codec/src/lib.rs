//! # usagelog Codec
//!
//! Row model and binary wire codec for usagelog replication payloads.
//!
//! A payload carries every not-yet-replicated row of one device in seven
//! ordered sections:
//!
//! 1. Contexts
//! 2. Steps
//! 3. Exceptions
//! 4. Features
//! 5. FeatureEntries
//! 6. FeatureEntrySteps
//! 7. FeatureExceptionEntries
//!
//! ## Wire Rules
//!
//! - Each section opens with a `u16` little-endian record count
//! - Identifiers and tick timestamps are `i64` little-endian
//! - Floats travel as their IEEE-754 bit pattern, little-endian
//! - Strings are a `u16` length followed by one byte per character
//! - No version tag, no padding, no trailing bytes
//!
//! ## Usage
//!
//! ```
//! use usagelog_codec::{pack, unpack, ContextRow, Snapshot};
//!
//! let mut snapshot = Snapshot::new();
//! snapshot.contexts.push(ContextRow {
//!     id: 1,
//!     name: "Agenda".into(),
//! });
//!
//! let bytes = pack(&snapshot).unwrap();
//! let decoded = unpack(&bytes).unwrap();
//! assert_eq!(snapshot, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod rows;

pub use bytes::Bytes;
pub use decoder::{unpack, PayloadDecoder};
pub use encoder::{encoded_len, pack, PayloadEncoder};
pub use error::{CodecError, CodecResult};
pub use rows::{
    ContextRow, ExceptionRow, FeatureEntryRow, FeatureEntryStepRow, FeatureExceptionEntryRow,
    FeatureRow, Section, Snapshot, StepRow, Ticks,
};

/// Trait for types that can be encoded to a wire payload.
pub trait Encode {
    /// Encode this value to payload bytes.
    fn encode(&self) -> CodecResult<Bytes>;
}

/// Trait for types that can be decoded from a wire payload.
pub trait Decode: Sized {
    /// Decode this value from payload bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Snapshot {
    fn encode(&self) -> CodecResult<Bytes> {
        pack(self)
    }
}

impl Decode for Snapshot {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        unpack(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn latin1_string() -> impl Strategy<Value = String> {
        prop::collection::vec(any::<u8>(), 0..40)
            .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
    }

    fn finite_f64() -> impl Strategy<Value = f64> {
        prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::SUBNORMAL
    }

    fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
        (
            prop::collection::vec((any::<i64>(), latin1_string()), 0..8),
            prop::collection::vec((any::<i64>(), latin1_string()), 0..8),
            prop::collection::vec(
                (any::<i64>(), finite_f64(), latin1_string(), any::<i64>(), any::<i64>()),
                0..300,
            ),
            prop::collection::vec((any::<i64>(), any::<i64>(), any::<i64>()), 0..8),
        )
            .prop_map(|(contexts, features, entries, exceptions)| Snapshot {
                contexts: contexts
                    .into_iter()
                    .map(|(id, name)| ContextRow { id, name })
                    .collect(),
                steps: Vec::new(),
                exceptions: Vec::new(),
                features: features
                    .into_iter()
                    .map(|(id, name)| FeatureRow {
                        id,
                        name,
                        context_id: id.wrapping_add(1),
                    })
                    .collect(),
                feature_entries: entries
                    .into_iter()
                    .map(|(id, time_spent, details, created_at, feature_id)| FeatureEntryRow {
                        id,
                        time_spent,
                        details,
                        created_at: Ticks(created_at),
                        feature_id,
                    })
                    .collect(),
                feature_entry_steps: Vec::new(),
                feature_exception_entries: exceptions
                    .into_iter()
                    .map(|(exception_id, created_at, feature_id)| FeatureExceptionEntryRow {
                        exception_id,
                        created_at: Ticks(created_at),
                        feature_id,
                    })
                    .collect(),
            })
    }

    proptest! {
        #[test]
        fn pack_unpack_is_lossless(snapshot in snapshot_strategy()) {
            let bytes = pack(&snapshot).unwrap();
            prop_assert_eq!(bytes.len(), encoded_len(&snapshot).unwrap());
            prop_assert_eq!(unpack(&bytes).unwrap(), snapshot);
        }
    }

    #[test]
    fn traits_delegate_to_pack_and_unpack() {
        let mut snapshot = Snapshot::new();
        snapshot.steps.push(StepRow {
            id: -3,
            name: "Confirm".into(),
        });

        let bytes = snapshot.encode().unwrap();
        assert_eq!(bytes, pack(&snapshot).unwrap());
        assert_eq!(Snapshot::decode(&bytes).unwrap(), snapshot);
    }
}
