//! Payload decoder.

use crate::error::{CodecError, CodecResult};
use crate::rows::{
    ContextRow, ExceptionRow, FeatureEntryRow, FeatureEntryStepRow, FeatureExceptionEntryRow,
    FeatureRow, Snapshot, StepRow, Ticks,
};

/// Decode a snapshot from a payload buffer.
///
/// The whole buffer must be consumed: a payload that ends early or carries
/// bytes after the last section is rejected, and nothing is returned.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if the buffer is shorter than its
/// declared counts and lengths, or [`CodecError::TrailingBytes`] if it is
/// longer.
pub fn unpack(bytes: &[u8]) -> CodecResult<Snapshot> {
    let mut decoder = PayloadDecoder::new(bytes);
    let snapshot = decoder.decode()?;
    decoder.finish()?;
    Ok(snapshot)
}

/// A payload decoder over a borrowed buffer.
pub struct PayloadDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the seven sections.
    pub fn decode(&mut self) -> CodecResult<Snapshot> {
        let contexts = self.read_section(|d| {
            Ok(ContextRow {
                id: d.read_i64()?,
                name: d.read_str()?,
            })
        })?;
        let steps = self.read_section(|d| {
            Ok(StepRow {
                id: d.read_i64()?,
                name: d.read_str()?,
            })
        })?;
        let exceptions = self.read_section(|d| {
            Ok(ExceptionRow {
                id: d.read_i64()?,
                content: d.read_str()?,
            })
        })?;
        let features = self.read_section(|d| {
            Ok(FeatureRow {
                id: d.read_i64()?,
                name: d.read_str()?,
                context_id: d.read_i64()?,
            })
        })?;
        let feature_entries = self.read_section(|d| {
            Ok(FeatureEntryRow {
                id: d.read_i64()?,
                time_spent: d.read_f64()?,
                details: d.read_str()?,
                created_at: Ticks(d.read_i64()?),
                feature_id: d.read_i64()?,
            })
        })?;
        let feature_entry_steps = self.read_section(|d| {
            Ok(FeatureEntryStepRow {
                time_spent: d.read_f64()?,
                details: d.read_str()?,
                feature_entry_id: d.read_i64()?,
                feature_step_id: d.read_i64()?,
            })
        })?;
        let feature_exception_entries = self.read_section(|d| {
            Ok(FeatureExceptionEntryRow {
                exception_id: d.read_i64()?,
                created_at: Ticks(d.read_i64()?),
                feature_id: d.read_i64()?,
            })
        })?;

        Ok(Snapshot {
            contexts,
            steps,
            exceptions,
            features,
            feature_entries,
            feature_entry_steps,
            feature_exception_entries,
        })
    }

    /// Fails if any bytes remain unread.
    pub fn finish(&self) -> CodecResult<()> {
        match self.remaining().len() {
            0 => Ok(()),
            count => Err(CodecError::TrailingBytes { count }),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    fn read_section<T, F>(&mut self, mut read_record: F) -> CodecResult<Vec<T>>
    where
        F: FnMut(&mut Self) -> CodecResult<T>,
    {
        let count = usize::from(self.read_u16()?);
        // A record is never smaller than one byte, so this bounds the
        // allocation by the buffer actually present.
        let mut records = Vec::with_capacity(count.min(self.remaining().len()));
        for _ in 0..count {
            records.push(read_record(self)?);
        }
        Ok(records)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.data.len().saturating_sub(self.pos);
        if len > remaining {
            return Err(CodecError::eof(len, remaining));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn read_u16(&mut self) -> CodecResult<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    fn read_i64(&mut self) -> CodecResult<i64> {
        self.read_array().map(i64::from_le_bytes)
    }

    fn read_f64(&mut self) -> CodecResult<f64> {
        self.read_array()
            .map(|bytes| f64::from_bits(u64::from_le_bytes(bytes)))
    }

    fn read_str(&mut self) -> CodecResult<String> {
        let len = usize::from(self.read_u16()?);
        let bytes = self.read_bytes(len)?;
        // Single-byte text: byte value is the code point (Latin-1)
        Ok(bytes.iter().copied().map(char::from).collect())
    }
}
