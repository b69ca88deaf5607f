//! Payload encoder.

use crate::error::{CodecError, CodecResult};
use crate::rows::{
    ContextRow, ExceptionRow, FeatureEntryRow, FeatureEntryStepRow, FeatureExceptionEntryRow,
    FeatureRow, Section, Snapshot, StepRow, Ticks,
};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of a section count or string length prefix.
const PREFIX_LEN: usize = 2;
/// Size of an identifier, tick timestamp or float field.
const WORD_LEN: usize = 8;

/// Encode a snapshot into one exactly-sized buffer.
///
/// The buffer length is computed by [`encoded_len`] before anything is
/// written, so the buffer never grows.
///
/// # Errors
///
/// Returns an error if a section holds more than `u16::MAX` records, a
/// string is longer than `u16::MAX` characters, or a string contains a
/// character outside U+0000..=U+00FF.
pub fn pack(snapshot: &Snapshot) -> CodecResult<Bytes> {
    let len = encoded_len(snapshot)?;
    let mut encoder = PayloadEncoder::with_capacity(len);
    encoder.encode(snapshot)?;
    debug_assert_eq!(encoder.len(), len);
    Ok(encoder.into_bytes())
}

/// Computes the exact encoded size of a snapshot.
///
/// # Errors
///
/// Fails on the same conditions as [`pack`].
pub fn encoded_len(snapshot: &Snapshot) -> CodecResult<usize> {
    for section in Section::ALL {
        let count = snapshot.section_len(section);
        if u16::try_from(count).is_err() {
            return Err(CodecError::too_many_records(section, count));
        }
    }

    let mut len = Section::ALL.len() * PREFIX_LEN;

    for row in &snapshot.contexts {
        len += WORD_LEN + wire_str_len(&row.name)?;
    }
    for row in &snapshot.steps {
        len += WORD_LEN + wire_str_len(&row.name)?;
    }
    for row in &snapshot.exceptions {
        len += WORD_LEN + wire_str_len(&row.content)?;
    }
    for row in &snapshot.features {
        len += 2 * WORD_LEN + wire_str_len(&row.name)?;
    }
    for row in &snapshot.feature_entries {
        len += 4 * WORD_LEN + wire_str_len(&row.details)?;
    }
    for row in &snapshot.feature_entry_steps {
        len += 3 * WORD_LEN + wire_str_len(&row.details)?;
    }
    len += snapshot.feature_exception_entries.len() * 3 * WORD_LEN;

    Ok(len)
}

/// Encoded size of a string including its length prefix.
fn wire_str_len(text: &str) -> CodecResult<usize> {
    let mut chars = 0usize;
    for ch in text.chars() {
        if u32::from(ch) > 0xFF {
            return Err(CodecError::UnrepresentableChar { ch });
        }
        chars += 1;
    }
    if u16::try_from(chars).is_err() {
        return Err(CodecError::StringTooLong { len: chars });
    }
    Ok(PREFIX_LEN + chars)
}

/// A payload encoder writing into a preallocated buffer.
pub struct PayloadEncoder {
    buffer: BytesMut,
}

impl PayloadEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Encode all seven sections of a snapshot.
    pub fn encode(&mut self, snapshot: &Snapshot) -> CodecResult<()> {
        self.put_count(Section::Contexts, snapshot.contexts.len())?;
        for row in &snapshot.contexts {
            self.encode_context(row)?;
        }

        self.put_count(Section::Steps, snapshot.steps.len())?;
        for row in &snapshot.steps {
            self.encode_step(row)?;
        }

        self.put_count(Section::Exceptions, snapshot.exceptions.len())?;
        for row in &snapshot.exceptions {
            self.encode_exception(row)?;
        }

        self.put_count(Section::Features, snapshot.features.len())?;
        for row in &snapshot.features {
            self.encode_feature(row)?;
        }

        self.put_count(Section::FeatureEntries, snapshot.feature_entries.len())?;
        for row in &snapshot.feature_entries {
            self.encode_feature_entry(row)?;
        }

        self.put_count(
            Section::FeatureEntrySteps,
            snapshot.feature_entry_steps.len(),
        )?;
        for row in &snapshot.feature_entry_steps {
            self.encode_feature_entry_step(row)?;
        }

        self.put_count(
            Section::FeatureExceptionEntries,
            snapshot.feature_exception_entries.len(),
        )?;
        for row in &snapshot.feature_exception_entries {
            self.encode_feature_exception_entry(row);
        }

        Ok(())
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buffer.freeze()
    }

    fn encode_context(&mut self, row: &ContextRow) -> CodecResult<()> {
        self.buffer.put_i64_le(row.id);
        self.put_str(&row.name)
    }

    fn encode_step(&mut self, row: &StepRow) -> CodecResult<()> {
        self.buffer.put_i64_le(row.id);
        self.put_str(&row.name)
    }

    fn encode_exception(&mut self, row: &ExceptionRow) -> CodecResult<()> {
        self.buffer.put_i64_le(row.id);
        self.put_str(&row.content)
    }

    fn encode_feature(&mut self, row: &FeatureRow) -> CodecResult<()> {
        self.buffer.put_i64_le(row.id);
        self.put_str(&row.name)?;
        self.buffer.put_i64_le(row.context_id);
        Ok(())
    }

    fn encode_feature_entry(&mut self, row: &FeatureEntryRow) -> CodecResult<()> {
        self.buffer.put_i64_le(row.id);
        self.buffer.put_u64_le(row.time_spent.to_bits());
        self.put_str(&row.details)?;
        self.put_ticks(row.created_at);
        self.buffer.put_i64_le(row.feature_id);
        Ok(())
    }

    fn encode_feature_entry_step(&mut self, row: &FeatureEntryStepRow) -> CodecResult<()> {
        self.buffer.put_u64_le(row.time_spent.to_bits());
        self.put_str(&row.details)?;
        self.buffer.put_i64_le(row.feature_entry_id);
        self.buffer.put_i64_le(row.feature_step_id);
        Ok(())
    }

    fn encode_feature_exception_entry(&mut self, row: &FeatureExceptionEntryRow) {
        self.buffer.put_i64_le(row.exception_id);
        self.put_ticks(row.created_at);
        self.buffer.put_i64_le(row.feature_id);
    }

    fn put_count(&mut self, section: Section, count: usize) -> CodecResult<()> {
        let count16 =
            u16::try_from(count).map_err(|_| CodecError::too_many_records(section, count))?;
        self.buffer.put_u16_le(count16);
        Ok(())
    }

    fn put_ticks(&mut self, ticks: Ticks) {
        self.buffer.put_i64_le(ticks.as_i64());
    }

    fn put_str(&mut self, text: &str) -> CodecResult<()> {
        let chars = text.chars().count();
        let len = u16::try_from(chars).map_err(|_| CodecError::StringTooLong { len: chars })?;
        self.buffer.put_u16_le(len);
        for ch in text.chars() {
            // One byte per character: only U+0000..=U+00FF fit
            let byte = u8::try_from(u32::from(ch))
                .map_err(|_| CodecError::UnrepresentableChar { ch })?;
            self.buffer.put_u8(byte);
        }
        Ok(())
    }
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new()
    }
}
