//! Declared column types and the field-schema mini-grammar.
//!
//! A schema is an ordered list of [`FieldSpec`] values matching the on-disk
//! column order of the input. Types are always declared by the caller, never
//! inferred. The textual form accepted by [`FieldSchema::from_str`] is a
//! comma-separated list such as `uint32,string(25),float64,date`.

use std::{fmt, mem, ops::Index, str::FromStr};

use thiserror::Error;

use crate::column::Date;

/// Primitive kinds a column can be encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Signed 8-bit integer.
    Int8,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// Fixed-width string; the width lives on [`FieldSpec::fixed_size`].
    String,
    /// Calendar date without time of day.
    Date,
}

impl ColumnType {
    /// Width in bytes of one stored value, or `None` for strings whose width
    /// depends on the declared size.
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::UInt8 | ColumnType::Int8 => Some(1),
            ColumnType::UInt16 | ColumnType::Int16 => Some(2),
            ColumnType::UInt32 | ColumnType::Int32 | ColumnType::Float32 => Some(4),
            ColumnType::UInt64 | ColumnType::Int64 | ColumnType::Float64 => Some(8),
            ColumnType::Date => Some(mem::size_of::<Date>()),
            ColumnType::String => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            ColumnType::UInt8 => "uint8",
            ColumnType::UInt16 => "uint16",
            ColumnType::UInt32 => "uint32",
            ColumnType::UInt64 => "uint64",
            ColumnType::Int8 => "int8",
            ColumnType::Int16 => "int16",
            ColumnType::Int32 => "int32",
            ColumnType::Int64 => "int64",
            ColumnType::Float32 => "float32",
            ColumnType::Float64 => "float64",
            ColumnType::String => "string",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One schema entry: a column type plus, for strings, the maximum byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldSpec {
    column_type: ColumnType,
    fixed_size: usize,
}

impl FieldSpec {
    /// A non-string field.
    pub const fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            fixed_size: 0,
        }
    }

    /// A string field holding at most `max_size` bytes per value.
    pub const fn string(max_size: usize) -> Self {
        Self {
            column_type: ColumnType::String,
            fixed_size: max_size,
        }
    }

    /// Declared column type.
    pub const fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Declared maximum byte length; zero for non-string fields.
    pub const fn fixed_size(&self) -> usize {
        self.fixed_size
    }

    /// Bytes this field contributes to the estimated row width.
    pub const fn encoded_width(&self) -> usize {
        match self.column_type.fixed_width() {
            Some(width) => width,
            None => self.fixed_size,
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column_type {
            ColumnType::String => write!(f, "string({})", self.fixed_size),
            other => fmt::Display::fmt(&other, f),
        }
    }
}

impl FromStr for FieldSpec {
    type Err = SchemaError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        let column_type = match token {
            "uint8" => ColumnType::UInt8,
            "uint16" => ColumnType::UInt16,
            "uint32" => ColumnType::UInt32,
            "uint64" => ColumnType::UInt64,
            "int8" => ColumnType::Int8,
            "int16" => ColumnType::Int16,
            "int32" => ColumnType::Int32,
            "int64" => ColumnType::Int64,
            "float32" => ColumnType::Float32,
            "float64" => ColumnType::Float64,
            // `mysql_date` is the spelling older workload scripts use.
            "date" | "mysql_date" => ColumnType::Date,
            _ => return parse_string_token(token),
        };
        Ok(FieldSpec::new(column_type))
    }
}

fn parse_string_token(token: &str) -> Result<FieldSpec, SchemaError> {
    let Some(rest) = token.strip_prefix("string") else {
        return Err(SchemaError::UnknownType(token.to_string()));
    };
    let size = rest
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| SchemaError::MalformedString(token.to_string()))?;
    let size = size
        .trim()
        .parse::<usize>()
        .map_err(|_| SchemaError::MalformedString(token.to_string()))?;
    Ok(FieldSpec::string(size))
}

/// Ordered field list describing every column of an input file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldSpec>,
}

impl FieldSchema {
    /// Build a schema from fields in on-disk order.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Fields in on-disk order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the schema declares no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Estimated fixed width of one encoded row.
    pub fn row_width(&self) -> usize {
        self.fields.iter().map(FieldSpec::encoded_width).sum()
    }
}

impl Index<usize> for FieldSchema {
    type Output = FieldSpec;

    fn index(&self, index: usize) -> &Self::Output {
        &self.fields[index]
    }
}

impl FromStr for FieldSchema {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.trim().is_empty() {
            return Err(SchemaError::Empty);
        }
        text.split(',')
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(FieldSchema::new)
    }
}

impl fmt::Display for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            fmt::Display::fmt(field, f)?;
        }
        Ok(())
    }
}

/// Errors raised while parsing a field-schema string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema string contained no tokens.
    #[error("field schema is empty")]
    Empty,
    /// A token did not name a known column type.
    #[error("invalid column type '{0}'")]
    UnknownType(String),
    /// A `string(N)` token was missing its size or parentheses.
    #[error("malformed string column '{0}', expected string(N)")]
    MalformedString(String),
}
