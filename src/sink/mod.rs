//! Database sinks: the narrow capability the pipeline drives.
//!
//! A [`Connector`] creates one [`Sink`] per worker; the sink is owned by that
//! worker for the lifetime of the pipeline and is never shared across threads.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use thiserror::Error;

pub use self::memory::{MemoryConnector, MemorySink, MemoryStore};
#[cfg(feature = "sqlite")]
pub use self::sqlite::{SqliteConnector, SqliteSink};
use crate::chunk::ColumnarChunk;

/// Errors returned by a sink or connector.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The connection for a worker could not be established.
    #[error("worker {worker} failed to connect: {message}")]
    Connect {
        /// Index of the worker that tried to connect.
        worker: usize,
        /// Message reported by the database.
        message: String,
    },
    /// SQLite reported an error.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Arrow failed to materialize a chunk.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    /// Any other database failure, with its human-readable message.
    #[error("database error: {0}")]
    Database(String),
}

/// Statement execution and bulk loading against one database connection.
pub trait Sink {
    /// Run one statement, consuming any rows it produces.
    fn execute(&mut self, statement: &str) -> Result<(), SinkError>;

    /// Insert every row of `chunk` into `table`, preserving column order.
    fn load_chunk(&mut self, table: &str, chunk: &ColumnarChunk) -> Result<(), SinkError>;

    /// Release the connection.
    fn close(self) -> Result<(), SinkError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Factory for per-worker sinks.
pub trait Connector: Send + Sync + 'static {
    /// Sink type handed to workers.
    type Sink: Sink + Send + 'static;

    /// Open a sink for the worker with index `worker`.
    fn connect(&self, worker: usize) -> Result<Self::Sink, SinkError>;
}
