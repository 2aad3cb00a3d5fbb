//! Resolved run configuration.

use std::path::PathBuf;
#[cfg(feature = "sqlite")]
use std::time::Duration;

use thiserror::Error;

use crate::{
    csv::{CsvOptions, EncodeError},
    pipeline::{PipelineOptions, DEFAULT_MEMORY_BUDGET},
};

/// Which database the workers connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// A SQLite database file, one connection per worker.
    #[cfg(feature = "sqlite")]
    Sqlite {
        /// Database file.
        path: PathBuf,
        /// Wait on a locked database before failing a statement.
        busy_timeout: Duration,
    },
    /// In-process Arrow store; nothing is persisted.
    Memory,
}

/// A CSV ingestion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRequest {
    /// CSV file, or directory of CSV files.
    pub path: PathBuf,
    /// Delimiter, header and schema for the files.
    pub options: CsvOptions,
}

/// A query-replay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Query file, or directory of query files.
    pub path: PathBuf,
    /// Where the `"<succeeded>,<seconds>"` line is written.
    pub result_path: PathBuf,
}

/// Everything a run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    pub(crate) backend: Backend,
    pub(crate) table: Option<String>,
    pub(crate) threads: usize,
    pub(crate) memory_budget: usize,
    pub(crate) csv: Option<CsvRequest>,
    pub(crate) queries: Option<QueryRequest>,
}

impl LoaderOptions {
    /// Defaults: one thread, a 128 MiB budget and nothing to do.
    pub fn new(backend: Backend) -> Self {
        LoaderOptions {
            backend,
            table: None,
            threads: 1,
            memory_budget: DEFAULT_MEMORY_BUDGET,
            csv: None,
            queries: None,
        }
    }

    /// Target table for CSV loads.
    pub fn table(self, table: impl Into<String>) -> Self {
        LoaderOptions {
            table: Some(table.into()),
            ..self
        }
    }

    /// Worker thread count.
    pub fn threads(self, threads: usize) -> Self {
        LoaderOptions { threads, ..self }
    }

    /// Byte budget for in-flight work.
    pub fn memory_budget(self, memory_budget: usize) -> Self {
        LoaderOptions {
            memory_budget,
            ..self
        }
    }

    /// Load CSV data before any queries run.
    pub fn load_csv(self, path: impl Into<PathBuf>, options: CsvOptions) -> Self {
        LoaderOptions {
            csv: Some(CsvRequest {
                path: path.into(),
                options,
            }),
            ..self
        }
    }

    /// Replay query files and write the result line.
    pub fn run_queries(self, path: impl Into<PathBuf>, result_path: impl Into<PathBuf>) -> Self {
        LoaderOptions {
            queries: Some(QueryRequest {
                path: path.into(),
                result_path: result_path.into(),
            }),
            ..self
        }
    }

    /// Configured backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// The CSV request, if any.
    pub fn csv(&self) -> Option<&CsvRequest> {
        self.csv.as_ref()
    }

    /// The query request, if any.
    pub fn queries(&self) -> Option<&QueryRequest> {
        self.queries.as_ref()
    }

    pub(crate) fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions::default()
            .threads(self.threads)
            .memory_budget(self.memory_budget)
    }

    /// Report configuration errors before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        if self.memory_budget == 0 {
            return Err(ConfigError::NoMemory);
        }
        match &self.backend {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                return Err(ConfigError::MissingDatabase);
            }
            _ => {}
        }
        if let Some(csv) = &self.csv {
            if self.table.as_deref().map_or(true, str::is_empty) {
                return Err(ConfigError::MissingTable);
            }
            csv.options.max_rows().map_err(ConfigError::ChunkSize)?;
        }
        if self.csv.is_none() && self.queries.is_none() {
            return Err(ConfigError::NothingToDo);
        }
        Ok(())
    }
}

/// Problems with a configuration, reported before any work starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Thread count was zero.
    #[error("thread count must be at least 1")]
    NoThreads,
    /// Memory budget was zero.
    #[error("memory budget must be greater than zero")]
    NoMemory,
    /// A file-backed database needs a path.
    #[error("no database specified")]
    MissingDatabase,
    /// CSV loads need a target table.
    #[error("no table specified for csv load")]
    MissingTable,
    /// The schema and chunk budget cannot size a chunk.
    #[error("invalid chunk sizing: {0}")]
    ChunkSize(#[source] EncodeError),
    /// Neither a load nor a query run was requested.
    #[error("nothing to do: request a csv load, a query run, or both")]
    NothingToDo,
    /// Any other invalid option, with a description.
    #[error("{0}")]
    Invalid(String),
}
