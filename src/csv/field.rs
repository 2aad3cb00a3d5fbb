//! Parsing of a single CSV field into its destination column slot.

use std::str::FromStr;

use chrono::NaiveDate;
use thiserror::Error;

use crate::{
    column::{ColumnBuffer, Date},
    schema::ColumnType,
};

/// Why a single field could not be stored.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Text is not a valid literal of the declared numeric type.
    #[error("invalid {expected} value {text:?}")]
    InvalidValue {
        /// Declared column type.
        expected: ColumnType,
        /// Offending text, lossily decoded.
        text: String,
    },
    /// String value longer than the declared `string(N)` size.
    #[error("string of {len} bytes exceeds declared size {max}")]
    StringTooLong {
        /// Length of the value in bytes.
        len: usize,
        /// Declared maximum.
        max: usize,
    },
    /// Text is not a `year-month-day` calendar date.
    #[error("invalid date {text:?}")]
    InvalidDate {
        /// Offending text, lossily decoded.
        text: String,
    },
}

/// Parse `text` and store it at `row` of `column`.
pub(crate) fn write_field(
    column: &mut ColumnBuffer,
    row: usize,
    text: &[u8],
) -> Result<(), FieldError> {
    match column {
        ColumnBuffer::UInt8(values) => values[row] = parse_number(text, ColumnType::UInt8)?,
        ColumnBuffer::UInt16(values) => values[row] = parse_number(text, ColumnType::UInt16)?,
        ColumnBuffer::UInt32(values) => values[row] = parse_number(text, ColumnType::UInt32)?,
        ColumnBuffer::UInt64(values) => values[row] = parse_number(text, ColumnType::UInt64)?,
        ColumnBuffer::Int8(values) => values[row] = parse_number(text, ColumnType::Int8)?,
        ColumnBuffer::Int16(values) => values[row] = parse_number(text, ColumnType::Int16)?,
        ColumnBuffer::Int32(values) => values[row] = parse_number(text, ColumnType::Int32)?,
        ColumnBuffer::Int64(values) => values[row] = parse_number(text, ColumnType::Int64)?,
        ColumnBuffer::Float32(values) => values[row] = parse_number(text, ColumnType::Float32)?,
        ColumnBuffer::Float64(values) => values[row] = parse_number(text, ColumnType::Float64)?,
        ColumnBuffer::String(strings) => {
            let max = strings.max_size();
            strings
                .set(row, text)
                .map_err(|len| FieldError::StringTooLong { len, max })?
        }
        ColumnBuffer::Date(values) => values[row] = parse_date(text)?,
    }
    Ok(())
}

fn parse_number<T: FromStr>(text: &[u8], expected: ColumnType) -> Result<T, FieldError> {
    std::str::from_utf8(text)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| FieldError::InvalidValue {
            expected,
            text: String::from_utf8_lossy(text).into_owned(),
        })
}

/// Parse `year-month-day`, ignoring any time of day after a space or `T`.
pub(crate) fn parse_date(text: &[u8]) -> Result<Date, FieldError> {
    let invalid = || FieldError::InvalidDate {
        text: String::from_utf8_lossy(text).into_owned(),
    };
    let date = text
        .split(|&b| b == b' ' || b == b'T')
        .next()
        .unwrap_or_default();
    let mut parts = date.splitn(3, |&b| b == b'-');
    let mut component = || -> Result<u32, FieldError> {
        let part = parts.next().ok_or_else(invalid)?;
        parse_number::<u32>(part, ColumnType::Date).map_err(|_| invalid())
    };
    let (year, month, day) = (component()?, component()?, component()?);

    let valid = i32::try_from(year)
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        .is_some();
    if !valid {
        return Err(invalid());
    }
    Ok(Date::new(year, month, day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;

    #[test]
    fn numbers_are_parsed_strictly() {
        let mut column = ColumnBuffer::allocate(&FieldSpec::new(ColumnType::UInt8), 2);
        write_field(&mut column, 0, b"255").unwrap();
        assert_eq!(
            write_field(&mut column, 1, b"256"),
            Err(FieldError::InvalidValue {
                expected: ColumnType::UInt8,
                text: "256".into(),
            })
        );
        assert!(write_field(&mut column, 1, b" 1").is_err());
        assert!(write_field(&mut column, 1, b"-1").is_err());
        assert!(write_field(&mut column, 1, b"").is_err());

        let mut signed = ColumnBuffer::allocate(&FieldSpec::new(ColumnType::Int64), 1);
        write_field(&mut signed, 0, b"-9223372036854775808").unwrap();
        assert_eq!(signed, ColumnBuffer::Int64(vec![i64::MIN]));

        let mut floats = ColumnBuffer::allocate(&FieldSpec::new(ColumnType::Float64), 1);
        write_field(&mut floats, 0, b"1.25e2").unwrap();
        assert_eq!(floats, ColumnBuffer::Float64(vec![125.0]));
        assert!(write_field(&mut floats, 0, b"1.2.3").is_err());
    }

    #[test]
    fn dates_ignore_time_of_day() {
        assert_eq!(parse_date(b"2020-1-15"), Ok(Date::new(2020, 1, 15)));
        assert_eq!(
            parse_date(b"1998-12-01 10:30:00"),
            Ok(Date::new(1998, 12, 1))
        );
        assert_eq!(parse_date(b"1998-12-01T10:30"), Ok(Date::new(1998, 12, 1)));
        assert!(parse_date(b"2020-13-01").is_err());
        assert!(parse_date(b"2020-02-30").is_err());
        assert!(parse_date(b"2020-02").is_err());
        assert!(parse_date(b"2020/02/01").is_err());
        assert!(parse_date(b"2020-02-01-05").is_err());
    }

    #[test]
    fn oversized_strings_are_rejected() {
        let mut column = ColumnBuffer::allocate(&FieldSpec::string(5), 1);
        write_field(&mut column, 0, b"abc").unwrap();
        assert_eq!(
            write_field(&mut column, 0, b"abcdef"),
            Err(FieldError::StringTooLong { len: 6, max: 5 })
        );
    }
}
