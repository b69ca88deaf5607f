//! Error types for the codec crate.

use crate::rows::Section;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while packing or unpacking a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer ended before a declared count, length or field was read.
    #[error("unexpected end of payload: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// Bytes required by the next read.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Bytes remain after the last section was decoded.
    #[error("payload has {count} trailing bytes after the last section")]
    TrailingBytes {
        /// Number of unread bytes.
        count: usize,
    },

    /// A section holds more records than its 16-bit count can express.
    #[error("section {section} has {count} records, more than the format allows")]
    TooManyRecords {
        /// The offending section.
        section: Section,
        /// Number of records in the snapshot.
        count: usize,
    },

    /// A string is longer than its 16-bit length prefix can express.
    #[error("string of {len} characters exceeds the maximum wire length")]
    StringTooLong {
        /// Character count of the string.
        len: usize,
    },

    /// A character cannot be stored in a single byte.
    #[error("character {ch:?} cannot be encoded as a single byte")]
    UnrepresentableChar {
        /// The offending character.
        ch: char,
    },
}

impl CodecError {
    /// Create an unexpected end-of-payload error.
    pub fn eof(needed: usize, remaining: usize) -> Self {
        Self::UnexpectedEof { needed, remaining }
    }

    /// Create a too-many-records error.
    pub fn too_many_records(section: Section, count: usize) -> Self {
        Self::TooManyRecords { section, count }
    }
}
