//! Columnar chunks: a horizontal slice of rows stored column by column.

use std::sync::Arc;

use arrow::{
    array::{
        ArrayRef, Date32Array, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
        Int8Array, StringBuilder, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
    },
    datatypes::{DataType, Field, Schema, SchemaRef},
    error::ArrowError,
    record_batch::RecordBatch,
};

use crate::{
    column::{ColumnBuffer, Value},
    schema::{ColumnType, FieldSchema},
};

/// A batch of rows stored as one [`ColumnBuffer`] per schema field.
///
/// Chunks are write-once, read-once: the encoder fills and finalizes them,
/// after which they are moved to exactly one consumer and dropped there.
#[derive(Debug)]
pub struct ColumnarChunk {
    columns: Vec<ColumnBuffer>,
    rows: usize,
}

impl ColumnarChunk {
    /// Allocate a chunk with every column pre-sized for `rows` rows.
    pub(crate) fn allocate(schema: &FieldSchema, rows: usize) -> Self {
        Self {
            columns: schema
                .fields()
                .iter()
                .map(|field| ColumnBuffer::allocate(field, rows))
                .collect(),
            rows,
        }
    }

    /// Fix the row count of the chunk, trimming every column to `rows`.
    pub(crate) fn finalize(mut self, rows: usize) -> Self {
        for column in &mut self.columns {
            column.truncate(rows);
        }
        self.rows = rows.min(self.rows);
        self
    }

    pub(crate) fn column_mut(&mut self, index: usize) -> &mut ColumnBuffer {
        &mut self.columns[index]
    }

    /// Number of rows held by every column.
    pub fn num_rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// All columns in schema order.
    pub fn columns(&self) -> &[ColumnBuffer] {
        &self.columns
    }

    /// The column at `index`.
    pub fn column(&self, index: usize) -> Option<&ColumnBuffer> {
        self.columns.get(index)
    }

    /// Type of the column at `index`.
    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.column(index).map(ColumnBuffer::column_type)
    }

    /// Cells of one row in column order.
    pub fn row(&self, row: usize) -> Option<Vec<Value<'_>>> {
        self.columns.iter().map(|column| column.value(row)).collect()
    }

    /// Bytes held by all column buffers.
    pub fn memory_size(&self) -> usize {
        self.columns.iter().map(ColumnBuffer::memory_size).sum()
    }

    /// Arrow schema matching this chunk; columns are named `c0`, `c1`, ...
    pub fn arrow_schema(&self) -> SchemaRef {
        let fields = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| Field::new(format!("c{i}"), arrow_type(column.column_type()), false))
            .collect::<Vec<_>>();
        Arc::new(Schema::new(fields))
    }

    /// Copy the chunk into an Arrow [`RecordBatch`].
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let arrays = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| to_array(i, column))
            .collect::<Result<Vec<_>, _>>()?;
        RecordBatch::try_new(self.arrow_schema(), arrays)
    }
}

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::UInt8 => DataType::UInt8,
        ColumnType::UInt16 => DataType::UInt16,
        ColumnType::UInt32 => DataType::UInt32,
        ColumnType::UInt64 => DataType::UInt64,
        ColumnType::Int8 => DataType::Int8,
        ColumnType::Int16 => DataType::Int16,
        ColumnType::Int32 => DataType::Int32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float32 => DataType::Float32,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::String => DataType::Utf8,
        ColumnType::Date => DataType::Date32,
    }
}

fn to_array(index: usize, column: &ColumnBuffer) -> Result<ArrayRef, ArrowError> {
    let array: ArrayRef = match column {
        ColumnBuffer::UInt8(values) => Arc::new(UInt8Array::from(values.clone())),
        ColumnBuffer::UInt16(values) => Arc::new(UInt16Array::from(values.clone())),
        ColumnBuffer::UInt32(values) => Arc::new(UInt32Array::from(values.clone())),
        ColumnBuffer::UInt64(values) => Arc::new(UInt64Array::from(values.clone())),
        ColumnBuffer::Int8(values) => Arc::new(Int8Array::from(values.clone())),
        ColumnBuffer::Int16(values) => Arc::new(Int16Array::from(values.clone())),
        ColumnBuffer::Int32(values) => Arc::new(Int32Array::from(values.clone())),
        ColumnBuffer::Int64(values) => Arc::new(Int64Array::from(values.clone())),
        ColumnBuffer::Float32(values) => Arc::new(Float32Array::from(values.clone())),
        ColumnBuffer::Float64(values) => Arc::new(Float64Array::from(values.clone())),
        ColumnBuffer::String(strings) => {
            let mut builder = StringBuilder::with_capacity(strings.len(), strings.max_size());
            for bytes in strings.iter() {
                let value = std::str::from_utf8(bytes).map_err(|err| {
                    ArrowError::InvalidArgumentError(format!("column c{index}: {err}"))
                })?;
                builder.append_value(value);
            }
            Arc::new(builder.finish())
        }
        ColumnBuffer::Date(values) => {
            let days = values
                .iter()
                .map(|date| {
                    date.days_since_epoch().ok_or_else(|| {
                        ArrowError::InvalidArgumentError(format!(
                            "column c{index}: invalid date {date}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(Date32Array::from(days))
        }
    };
    Ok(array)
}
