#![deny(missing_docs)]
//! Columnar bulk loading and query replay for SQL databases.
//!
//! The crate has two halves that meet in [`pipeline::Pipeline`]:
//!
//! - [`csv::ChunkEncoder`] turns the bytes of a delimited text file into
//!   [`chunk::ColumnarChunk`]s of typed, pre-sized column buffers.
//! - [`pipeline::Pipeline`] hands those chunks (or batches of statements from
//!   [`query`]) to a fixed pool of workers while keeping the estimated size of
//!   in-flight work under a memory budget.
//!
//! Workers talk to the database through the [`sink::Sink`] capability; each
//! worker owns one sink, opened on first use.

mod error;
mod observability;

pub use crate::{
    error::Error,
    option::{Backend, ConfigError, CsvRequest, LoaderOptions, QueryRequest},
    run::{run, run_with, RunSummary},
};

/// Declared column types and the field-schema grammar.
pub mod schema;

/// Typed column buffers.
pub mod column;

/// Columnar chunks.
pub mod chunk;

/// CSV-to-columnar encoding.
pub mod csv;

/// Worker pool with memory-bounded admission.
pub mod pipeline;

/// Database sink capability and implementations.
pub mod sink;

/// CSV load runner.
pub mod load;

/// Query stream splitting and replay.
pub mod query;

/// Run configuration.
pub mod option;

/// End-to-end driver.
pub mod run;
