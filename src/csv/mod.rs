//! Streaming CSV-to-columnar encoder.
//!
//! [`ChunkEncoder`] walks the bytes of one whole file and yields
//! [`ColumnarChunk`]s of at most `max_chunk_size / row_width` rows each, in
//! input order. Every chunk's buffers are allocated once up front; fields are
//! parsed straight into their slots.

mod field;

use thiserror::Error;

pub use self::field::FieldError;
use self::field::write_field;
use crate::{chunk::ColumnarChunk, schema::FieldSchema};

/// Default per-chunk byte budget.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Delimiter, header and sizing configuration for one CSV input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub(crate) delimiter: u8,
    pub(crate) header: bool,
    pub(crate) max_chunk_size: usize,
    pub(crate) fields: FieldSchema,
}

impl CsvOptions {
    /// Options for `fields` with a `,` delimiter, a header line and the
    /// default chunk budget.
    pub fn new(fields: FieldSchema) -> Self {
        CsvOptions {
            delimiter: b',',
            header: true,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            fields,
        }
    }

    /// Set the single-byte field delimiter.
    pub fn delimiter(self, delimiter: u8) -> Self {
        CsvOptions { delimiter, ..self }
    }

    /// Whether the first line is a header to skip.
    pub fn header(self, header: bool) -> Self {
        CsvOptions { header, ..self }
    }

    /// Set the per-chunk byte budget.
    pub fn max_chunk_size(self, max_chunk_size: usize) -> Self {
        CsvOptions {
            max_chunk_size,
            ..self
        }
    }

    /// Declared field schema.
    pub fn fields(&self) -> &FieldSchema {
        &self.fields
    }

    /// Number of rows per full chunk.
    pub fn max_rows(&self) -> Result<usize, EncodeError> {
        let row_width = self.fields.row_width();
        if row_width == 0 {
            return Err(EncodeError::ZeroRowWidth);
        }
        if self.max_chunk_size < row_width {
            return Err(EncodeError::ChunkTooSmall {
                budget: self.max_chunk_size,
                row_width,
            });
        }
        Ok(self.max_chunk_size / row_width)
    }
}

/// Errors that abort encoding of a file.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The schema encodes to zero bytes per row.
    #[error("field schema has a row width of zero bytes")]
    ZeroRowWidth,
    /// The chunk budget cannot hold a single row.
    #[error("chunk budget of {budget} bytes is smaller than one row ({row_width} bytes)")]
    ChunkTooSmall {
        /// Configured chunk budget.
        budget: usize,
        /// Estimated row width.
        row_width: usize,
    },
    /// A row ended before every schema field was read.
    #[error("line {line}: expected {expected} fields, found {found}")]
    MissingField {
        /// 1-based line number.
        line: usize,
        /// Number of schema fields.
        expected: usize,
        /// Fields present on the line.
        found: usize,
    },
    /// A row carried more fields than the schema declares.
    #[error("line {line}: more than {expected} fields")]
    TrailingField {
        /// 1-based line number.
        line: usize,
        /// Number of schema fields.
        expected: usize,
    },
    /// A field could not be parsed into its declared type.
    #[error("line {line}, column {column}: {source}")]
    Field {
        /// 1-based line number.
        line: usize,
        /// 0-based column index.
        column: usize,
        /// What was wrong with the field.
        #[source]
        source: FieldError,
    },
}

impl EncodeError {
    /// True for errors caused by the options rather than the input bytes.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EncodeError::ZeroRowWidth | EncodeError::ChunkTooSmall { .. }
        )
    }
}

/// Iterator over the chunks of one CSV input.
///
/// Yields `Ok` chunks in input order. A parse failure is yielded once as
/// `Err`, discarding the chunk in progress, after which the iterator is
/// exhausted. The last chunk is always yielded, even when it holds no rows.
pub struct ChunkEncoder<'a> {
    input: &'a [u8],
    options: &'a CsvOptions,
    max_rows: usize,
    pos: usize,
    line: usize,
    done: bool,
}

impl<'a> ChunkEncoder<'a> {
    /// Prepare to encode `input`, skipping the header line when configured.
    pub fn new(input: &'a [u8], options: &'a CsvOptions) -> Result<Self, EncodeError> {
        let max_rows = options.max_rows()?;
        let mut encoder = ChunkEncoder {
            input,
            options,
            max_rows,
            pos: 0,
            line: 0,
            done: false,
        };
        if options.header {
            encoder.next_line();
        }
        Ok(encoder)
    }

    /// Rows per full chunk.
    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    fn next_line(&mut self) -> &'a [u8] {
        let rest = &self.input[self.pos..];
        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        self.line += 1;
        line.strip_suffix(b"\r").unwrap_or(line)
    }

    fn encode_row(&mut self, chunk: &mut ColumnarChunk, row: usize) -> Result<(), EncodeError> {
        let text = self.next_line();
        let line = self.line;
        let schema = &self.options.fields;
        let delimiter = self.options.delimiter;
        let mut fields = text.split(|&b| b == delimiter);

        for column in 0..schema.len() {
            let value = fields.next().ok_or(EncodeError::MissingField {
                line,
                expected: schema.len(),
                found: column,
            })?;
            write_field(chunk.column_mut(column), row, value).map_err(|source| {
                EncodeError::Field {
                    line,
                    column,
                    source,
                }
            })?;
        }

        // `a|b|c|` rows (TPC-H .tbl files) end with one empty field.
        match (fields.next(), fields.next()) {
            (None, _) | (Some(b""), None) => Ok(()),
            _ => Err(EncodeError::TrailingField {
                line,
                expected: schema.len(),
            }),
        }
    }
}

impl Iterator for ChunkEncoder<'_> {
    type Item = Result<ColumnarChunk, EncodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = ColumnarChunk::allocate(&self.options.fields, self.max_rows);
        let mut rows = 0;
        while rows < self.max_rows && self.pos < self.input.len() {
            if let Err(err) = self.encode_row(&mut chunk, rows) {
                self.done = true;
                return Some(Err(err));
            }
            rows += 1;
        }
        if self.pos >= self.input.len() {
            self.done = true;
        }
        Some(Ok(chunk.finalize(rows)))
    }
}

impl std::iter::FusedIterator for ChunkEncoder<'_> {}

/// Encode a whole input into chunks.
///
/// Unlike iterating a [`ChunkEncoder`], a parse failure discards every chunk.
pub fn encode(input: &[u8], options: &CsvOptions) -> Result<Vec<ColumnarChunk>, EncodeError> {
    ChunkEncoder::new(input, options)?.collect()
}
