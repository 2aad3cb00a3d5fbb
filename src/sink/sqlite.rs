use std::{path::PathBuf, time::Duration};

use rusqlite::{
    params_from_iter,
    types::{ToSqlOutput, Value as SqlValue, ValueRef},
    Connection, ToSql, TransactionBehavior,
};

use super::{Connector, Sink, SinkError};
use crate::{chunk::ColumnarChunk, column::Value, query::split_statements};

/// Opens one SQLite connection per worker against a database file.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    /// Connector for the database at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// How long a connection waits on a locked database before failing.
    pub fn busy_timeout(self, busy_timeout: Duration) -> Self {
        Self {
            busy_timeout,
            ..self
        }
    }
}

impl Connector for SqliteConnector {
    type Sink = SqliteSink;

    fn connect(&self, worker: usize) -> Result<SqliteSink, SinkError> {
        let connect_error = |err: rusqlite::Error| SinkError::Connect {
            worker,
            message: err.to_string(),
        };
        let conn = Connection::open(&self.path).map_err(connect_error)?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(connect_error)?;
        Ok(SqliteSink { conn })
    }
}

/// A worker-owned SQLite connection.
#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Sink for SqliteSink {
    fn execute(&mut self, statement: &str) -> Result<(), SinkError> {
        // SQLite refuses to prepare text holding nothing but comments.
        if split_statements(statement).is_empty() {
            return Ok(());
        }
        let mut stmt = self.conn.prepare(statement)?;
        let mut rows = stmt.query([])?;
        while rows.next()?.is_some() {}
        Ok(())
    }

    fn load_chunk(&mut self, table: &str, chunk: &ColumnarChunk) -> Result<(), SinkError> {
        if chunk.num_rows() == 0 {
            return Ok(());
        }
        let placeholders = vec!["?"; chunk.num_columns()].join(",");
        let sql = format!("INSERT INTO {table} VALUES ({placeholders})");

        // Rolled back on drop if any row fails. Immediate so concurrent
        // workers queue on the busy timeout instead of failing the upgrade.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for row in 0..chunk.num_rows() {
                let cells = chunk
                    .columns()
                    .iter()
                    .map(|column| column.value(row).map(SqlCell));
                stmt.execute(params_from_iter(cells))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn close(self) -> Result<(), SinkError> {
        self.conn.close().map_err(|(_, err)| err.into())
    }
}

struct SqlCell<'a>(Value<'a>);

impl ToSql for SqlCell<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self.0 {
            Value::UInt8(v) => SqlValue::Integer(v.into()),
            Value::UInt16(v) => SqlValue::Integer(v.into()),
            Value::UInt32(v) => SqlValue::Integer(v.into()),
            Value::UInt64(v) => SqlValue::Integer(
                i64::try_from(v)
                    .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?,
            ),
            Value::Int8(v) => SqlValue::Integer(v.into()),
            Value::Int16(v) => SqlValue::Integer(v.into()),
            Value::Int32(v) => SqlValue::Integer(v.into()),
            Value::Int64(v) => SqlValue::Integer(v),
            Value::Float32(v) => SqlValue::Real(v.into()),
            Value::Float64(v) => SqlValue::Real(v),
            Value::String(bytes) => return Ok(ToSqlOutput::Borrowed(ValueRef::Text(bytes))),
            Value::Date(date) => SqlValue::Text(date.to_string()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}
