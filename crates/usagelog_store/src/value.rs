//! Statement parameters and result rows.

use crate::error::{StoreError, StoreResult};

/// A dynamic SQL value.
///
/// Used both as a statement parameter and as a column of a result row.
/// Parameters are passed per call as owned slices; nothing is shared
/// between statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Signed 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// Text.
    Text(String),
    /// Byte blob.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the name of this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the float, widening integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes if this is a blob value.
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One result row: column values in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw value of a column.
    pub fn get(&self, index: usize) -> StoreResult<&Value> {
        self.values.get(index).ok_or(StoreError::ColumnOutOfRange {
            index,
            len: self.values.len(),
        })
    }

    /// Reads a column as a typed value.
    pub fn read<T: FromValue>(&self, index: usize) -> StoreResult<T> {
        T::from_value(index, self.get(index)?)
    }

    /// Returns the column values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Conversion from one column value.
pub trait FromValue: Sized {
    /// Converts the value stored in column `index`.
    fn from_value(index: usize, value: &Value) -> StoreResult<Self>;
}

fn mismatch(index: usize, expected: &'static str, value: &Value) -> StoreError {
    StoreError::TypeMismatch {
        index,
        expected,
        found: value.type_name(),
    }
}

impl FromValue for i64 {
    fn from_value(index: usize, value: &Value) -> StoreResult<Self> {
        value
            .as_integer()
            .ok_or_else(|| mismatch(index, "integer", value))
    }
}

impl FromValue for f64 {
    fn from_value(index: usize, value: &Value) -> StoreResult<Self> {
        value.as_real().ok_or_else(|| mismatch(index, "real", value))
    }
}

impl FromValue for String {
    fn from_value(index: usize, value: &Value) -> StoreResult<Self> {
        value
            .as_text()
            .map(str::to_owned)
            .ok_or_else(|| mismatch(index, "text", value))
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(index: usize, value: &Value) -> StoreResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(index, value).map(Some)
        }
    }
}

/// Conversion from a whole result row.
pub trait FromRow: Sized {
    /// Converts a row.
    fn from_row(row: &Row) -> StoreResult<Self>;
}

impl FromRow for Row {
    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok(row.clone())
    }
}

impl FromRow for i64 {
    fn from_row(row: &Row) -> StoreResult<Self> {
        row.read(0)
    }
}

impl FromRow for String {
    fn from_row(row: &Row) -> StoreResult<Self> {
        row.read(0)
    }
}

impl<A: FromValue, B: FromValue> FromRow for (A, B) {
    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok((row.read(0)?, row.read(1)?))
    }
}

impl<A: FromValue, B: FromValue, C: FromValue> FromRow for (A, B, C) {
    fn from_row(row: &Row) -> StoreResult<Self> {
        Ok((row.read(0)?, row.read(1)?, row.read(2)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_into_value() {
        assert_eq!(Value::from(7i64), Value::Integer(7));
        assert_eq!(Value::from(0.5f64), Value::Real(0.5));
        assert_eq!(Value::from("Agenda"), Value::Text("Agenda".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
    }

    #[test]
    fn typed_row_reads() {
        let row = Row::new(vec![
            Value::Integer(1),
            Value::Text("Agenda".into()),
            Value::Null,
            Value::Integer(4),
        ]);

        assert_eq!(row.read::<i64>(0).unwrap(), 1);
        assert_eq!(row.read::<String>(1).unwrap(), "Agenda");
        assert_eq!(row.read::<Option<i64>>(2).unwrap(), None);
        assert_eq!(row.read::<f64>(3).unwrap(), 4.0);
    }

    #[test]
    fn type_mismatch_reported() {
        let row = Row::new(vec![Value::Text("x".into())]);
        let err = row.read::<i64>(0).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                index: 0,
                expected: "integer",
                found: "text"
            }
        ));
    }

    #[test]
    fn column_out_of_range() {
        let row = Row::new(vec![Value::Integer(1)]);
        assert!(matches!(
            row.get(3),
            Err(StoreError::ColumnOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn tuple_from_row() {
        let row = Row::new(vec![Value::Integer(5), Value::Text("Save".into())]);
        let (id, name) = <(i64, String)>::from_row(&row).unwrap();
        assert_eq!(id, 5);
        assert_eq!(name, "Save");
    }
}
