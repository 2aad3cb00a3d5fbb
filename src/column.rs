//! Typed column buffers.
//!
//! A [`ColumnBuffer`] owns the storage for one column of a chunk. Numeric and
//! date columns are flat vectors in host byte order; string columns use a
//! single zeroed backing block split into fixed-width, NUL-terminated slots so
//! that filling a chunk never allocates per field.

use std::fmt;

use chrono::NaiveDate;

use crate::schema::{ColumnType, FieldSpec};

/// Calendar date stored as its components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct Date {
    /// Year, e.g. `2020`.
    pub year: u32,
    /// Month in `1..=12`.
    pub month: u32,
    /// Day of month in `1..=31`.
    pub day: u32,
}

impl Date {
    /// Build a date from its components without validation.
    pub const fn new(year: u32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// The matching [`NaiveDate`], or `None` when the components do not name
    /// a real calendar day.
    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(i32::try_from(self.year).ok()?, self.month, self.day)
    }

    /// Days since 1970-01-01, the Arrow `Date32` representation.
    pub fn days_since_epoch(self) -> Option<i32> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
        let days = self.to_naive()?.signed_duration_since(epoch).num_days();
        i32::try_from(days).ok()
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Fixed-width string storage for one column.
///
/// Row `i` occupies bytes `i * slot_width .. (i + 1) * slot_width` of the
/// backing block, where `slot_width = max_size + 1`. Values are written once
/// into zeroed slots, so the byte after the value is always the terminator.
#[derive(Debug, PartialEq, Eq)]
pub struct StringColumn {
    max_size: usize,
    block: Vec<u8>,
    len: usize,
}

impl StringColumn {
    fn with_rows(max_size: usize, rows: usize) -> Self {
        Self {
            max_size,
            block: vec![0; rows * (max_size + 1)],
            len: rows,
        }
    }

    /// Declared maximum byte length of a value.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the column holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn slot_width(&self) -> usize {
        self.max_size + 1
    }

    /// Raw bytes of the whole slot for `row`, terminator included.
    pub fn slot(&self, row: usize) -> Option<&[u8]> {
        if row >= self.len {
            return None;
        }
        let start = row * self.slot_width();
        Some(&self.block[start..start + self.slot_width()])
    }

    /// Value bytes stored at `row`, up to but excluding the terminator.
    pub fn get(&self, row: usize) -> Option<&[u8]> {
        let slot = self.slot(row)?;
        let end = slot.iter().position(|&b| b == 0).unwrap_or(self.max_size);
        Some(&slot[..end])
    }

    /// Iterate over the stored values in row order.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len).filter_map(move |row| self.get(row))
    }

    /// Copy `value` into the slot for `row`.
    ///
    /// Returns the value length as the error when it exceeds `max_size`.
    pub(crate) fn set(&mut self, row: usize, value: &[u8]) -> Result<(), usize> {
        if value.len() > self.max_size {
            return Err(value.len());
        }
        let start = row * self.slot_width();
        self.block[start..start + value.len()].copy_from_slice(value);
        self.block[start + value.len()] = 0;
        Ok(())
    }

    fn truncate(&mut self, rows: usize) {
        if rows < self.len {
            self.block.truncate(rows * self.slot_width());
            self.block.shrink_to_fit();
            self.len = rows;
        }
    }

    fn memory_size(&self) -> usize {
        self.block.len()
    }
}

/// Storage for one column, tagged by its type.
#[derive(Debug, PartialEq)]
pub enum ColumnBuffer {
    /// `uint8` values.
    UInt8(Vec<u8>),
    /// `uint16` values.
    UInt16(Vec<u16>),
    /// `uint32` values.
    UInt32(Vec<u32>),
    /// `uint64` values.
    UInt64(Vec<u64>),
    /// `int8` values.
    Int8(Vec<i8>),
    /// `int16` values.
    Int16(Vec<i16>),
    /// `int32` values.
    Int32(Vec<i32>),
    /// `int64` values.
    Int64(Vec<i64>),
    /// `float32` values.
    Float32(Vec<f32>),
    /// `float64` values.
    Float64(Vec<f64>),
    /// `string(N)` values.
    String(StringColumn),
    /// `date` values.
    Date(Vec<Date>),
}

/// A single borrowed cell read back from a [`ColumnBuffer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    /// `uint8` cell.
    UInt8(u8),
    /// `uint16` cell.
    UInt16(u16),
    /// `uint32` cell.
    UInt32(u32),
    /// `uint64` cell.
    UInt64(u64),
    /// `int8` cell.
    Int8(i8),
    /// `int16` cell.
    Int16(i16),
    /// `int32` cell.
    Int32(i32),
    /// `int64` cell.
    Int64(i64),
    /// `float32` cell.
    Float32(f32),
    /// `float64` cell.
    Float64(f64),
    /// String cell without its terminator.
    String(&'a [u8]),
    /// Date cell.
    Date(Date),
}

macro_rules! dispatch {
    ($buffer:expr, $values:ident => $body:expr, $strings:ident => $string_body:expr) => {
        match $buffer {
            ColumnBuffer::UInt8($values) => $body,
            ColumnBuffer::UInt16($values) => $body,
            ColumnBuffer::UInt32($values) => $body,
            ColumnBuffer::UInt64($values) => $body,
            ColumnBuffer::Int8($values) => $body,
            ColumnBuffer::Int16($values) => $body,
            ColumnBuffer::Int32($values) => $body,
            ColumnBuffer::Int64($values) => $body,
            ColumnBuffer::Float32($values) => $body,
            ColumnBuffer::Float64($values) => $body,
            ColumnBuffer::Date($values) => $body,
            ColumnBuffer::String($strings) => $string_body,
        }
    };
}

impl ColumnBuffer {
    /// Allocate a zeroed buffer able to hold `rows` values of `field`.
    pub fn allocate(field: &FieldSpec, rows: usize) -> Self {
        match field.column_type() {
            ColumnType::UInt8 => ColumnBuffer::UInt8(vec![0; rows]),
            ColumnType::UInt16 => ColumnBuffer::UInt16(vec![0; rows]),
            ColumnType::UInt32 => ColumnBuffer::UInt32(vec![0; rows]),
            ColumnType::UInt64 => ColumnBuffer::UInt64(vec![0; rows]),
            ColumnType::Int8 => ColumnBuffer::Int8(vec![0; rows]),
            ColumnType::Int16 => ColumnBuffer::Int16(vec![0; rows]),
            ColumnType::Int32 => ColumnBuffer::Int32(vec![0; rows]),
            ColumnType::Int64 => ColumnBuffer::Int64(vec![0; rows]),
            ColumnType::Float32 => ColumnBuffer::Float32(vec![0.0; rows]),
            ColumnType::Float64 => ColumnBuffer::Float64(vec![0.0; rows]),
            ColumnType::String => {
                ColumnBuffer::String(StringColumn::with_rows(field.fixed_size(), rows))
            }
            ColumnType::Date => ColumnBuffer::Date(vec![Date::default(); rows]),
        }
    }

    /// Type tag of this buffer.
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnBuffer::UInt8(_) => ColumnType::UInt8,
            ColumnBuffer::UInt16(_) => ColumnType::UInt16,
            ColumnBuffer::UInt32(_) => ColumnType::UInt32,
            ColumnBuffer::UInt64(_) => ColumnType::UInt64,
            ColumnBuffer::Int8(_) => ColumnType::Int8,
            ColumnBuffer::Int16(_) => ColumnType::Int16,
            ColumnBuffer::Int32(_) => ColumnType::Int32,
            ColumnBuffer::Int64(_) => ColumnType::Int64,
            ColumnBuffer::Float32(_) => ColumnType::Float32,
            ColumnBuffer::Float64(_) => ColumnType::Float64,
            ColumnBuffer::String(_) => ColumnType::String,
            ColumnBuffer::Date(_) => ColumnType::Date,
        }
    }

    /// Logical number of rows.
    pub fn len(&self) -> usize {
        dispatch!(self, values => values.len(), strings => strings.len())
    }

    /// True when the buffer holds no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by the buffer's storage.
    pub fn memory_size(&self) -> usize {
        dispatch!(
            self,
            values => std::mem::size_of_val(values.as_slice()),
            strings => strings.memory_size()
        )
    }

    /// Read the cell at `row`.
    pub fn value(&self, row: usize) -> Option<Value<'_>> {
        Some(match self {
            ColumnBuffer::UInt8(values) => Value::UInt8(*values.get(row)?),
            ColumnBuffer::UInt16(values) => Value::UInt16(*values.get(row)?),
            ColumnBuffer::UInt32(values) => Value::UInt32(*values.get(row)?),
            ColumnBuffer::UInt64(values) => Value::UInt64(*values.get(row)?),
            ColumnBuffer::Int8(values) => Value::Int8(*values.get(row)?),
            ColumnBuffer::Int16(values) => Value::Int16(*values.get(row)?),
            ColumnBuffer::Int32(values) => Value::Int32(*values.get(row)?),
            ColumnBuffer::Int64(values) => Value::Int64(*values.get(row)?),
            ColumnBuffer::Float32(values) => Value::Float32(*values.get(row)?),
            ColumnBuffer::Float64(values) => Value::Float64(*values.get(row)?),
            ColumnBuffer::String(strings) => Value::String(strings.get(row)?),
            ColumnBuffer::Date(values) => Value::Date(*values.get(row)?),
        })
    }

    pub(crate) fn truncate(&mut self, rows: usize) {
        dispatch!(
            self,
            values => {
                if rows < values.len() {
                    values.truncate(rows);
                    values.shrink_to_fit();
                }
            },
            strings => strings.truncate(rows)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_slots_are_terminated_and_independent() {
        let mut column = StringColumn::with_rows(5, 3);
        column.set(0, b"abc").unwrap();
        column.set(2, b"abcde").unwrap();

        assert_eq!(column.slot(0), Some(&b"abc\0\0\0"[..]));
        assert_eq!(column.get(0), Some(&b"abc"[..]));
        assert_eq!(column.get(1), Some(&b""[..]));
        assert_eq!(column.get(2), Some(&b"abcde"[..]));
        assert_eq!(column.get(3), None);
        assert_eq!(column.set(1, b"abcdef"), Err(6));
        assert_eq!(column.memory_size(), 18);
    }

    #[test]
    fn truncate_trims_storage() {
        let field = FieldSpec::string(3);
        let mut buffer = ColumnBuffer::allocate(&field, 10);
        assert_eq!(buffer.memory_size(), 40);
        buffer.truncate(2);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.memory_size(), 8);

        let mut numbers = ColumnBuffer::allocate(&FieldSpec::new(ColumnType::Int64), 10);
        assert_eq!(numbers.memory_size(), 80);
        numbers.truncate(3);
        assert_eq!(numbers.len(), 3);
        assert_eq!(numbers.memory_size(), 24);
        assert_eq!(numbers.value(2), Some(Value::Int64(0)));
        assert_eq!(numbers.value(3), None);
    }

    #[test]
    fn date_converts_to_epoch_days() {
        assert_eq!(Date::new(1970, 1, 1).days_since_epoch(), Some(0));
        assert_eq!(Date::new(2020, 1, 15).days_since_epoch(), Some(18276));
        assert_eq!(Date::new(2021, 2, 30).days_since_epoch(), None);
        assert_eq!(Date::new(2020, 1, 5).to_string(), "2020-01-05");
    }
}
