//! CSV ingestion: the producer side of the bulk-load path.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::{
    csv::{ChunkEncoder, CsvOptions, EncodeError},
    observability::{log_debug, log_error, log_info, log_warn},
    pipeline::{JobOutcome, Pipeline, PipelineError},
    sink::{Connector, Sink},
};

/// Regular files under `path`, sorted by name, or `path` itself when it is
/// not a directory.
pub fn list_files(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !fs::metadata(path)?.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Summary of a load run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Files that were read.
    pub files: usize,
    /// Files that could not be read or stopped on a parse failure.
    pub failed_files: usize,
    /// Chunks submitted to the pipeline.
    pub chunks: usize,
    /// Rows in the submitted chunks.
    pub rows_submitted: u64,
    /// Rows in chunks the sink accepted.
    pub rows_loaded: u64,
    /// Wall time until the pipeline drained.
    pub elapsed: Duration,
}

/// Errors that stop a load run before or between files.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The input path could not be listed.
    #[error("failed to list {path}: {source}")]
    List {
        /// Input path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The CSV options cannot size a chunk.
    #[error("invalid csv options: {0}")]
    Options(#[source] EncodeError),
    /// The pipeline stopped accepting work.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Loads CSV files into one table through a pipeline.
pub struct CsvLoader<'a, C: Connector> {
    pipeline: &'a Pipeline<C>,
    table: Arc<str>,
    options: Arc<CsvOptions>,
}

impl<'a, C: Connector> CsvLoader<'a, C> {
    /// Loader submitting to `pipeline` for `table`.
    pub fn new(pipeline: &'a Pipeline<C>, table: &str, options: CsvOptions) -> Self {
        Self {
            pipeline,
            table: Arc::from(table),
            options: Arc::new(options),
        }
    }

    /// Load every file under `path` and wait for the pipeline to drain.
    pub fn load(&self, path: &Path) -> Result<LoadReport, LoadError> {
        self.options.max_rows().map_err(LoadError::Options)?;
        let files = list_files(path).map_err(|source| LoadError::List {
            path: path.to_path_buf(),
            source,
        })?;
        log_info!(
            "load",
            "load_started",
            table = %self.table,
            files = files.len(),
        );

        let rows_loaded = Arc::new(AtomicU64::new(0));
        let mut report = LoadReport::default();
        let start = Instant::now();
        for file in &files {
            if !self.load_file(file, &rows_loaded, &mut report)? {
                report.failed_files += 1;
            }
        }
        self.pipeline.drain();
        report.elapsed = start.elapsed();
        report.rows_loaded = rows_loaded.load(Ordering::Relaxed);

        log_info!(
            "load",
            "load_finished",
            table = %self.table,
            files = report.files,
            failed_files = report.failed_files,
            chunks = report.chunks,
            rows_submitted = report.rows_submitted,
            rows_loaded = report.rows_loaded,
            elapsed_secs = report.elapsed.as_secs_f64(),
        );
        Ok(report)
    }

    /// Returns `false` when the file was skipped or stopped early.
    fn load_file(
        &self,
        path: &Path,
        rows_loaded: &Arc<AtomicU64>,
        report: &mut LoadReport,
    ) -> Result<bool, LoadError> {
        let len = match fs::metadata(path) {
            Ok(meta) => usize::try_from(meta.len()).unwrap_or(usize::MAX),
            Err(err) => {
                log_warn!(
                    "load",
                    "csv_metadata_failed",
                    path = %path.display(),
                    error = %err,
                );
                0
            }
        };
        // The whole file stays in memory while its chunks are encoded.
        let _reservation = self.pipeline.reserve(len);
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                log_error!(
                    "load",
                    "csv_read_failed",
                    path = %path.display(),
                    error = %err,
                );
                return Ok(false);
            }
        };
        report.files += 1;
        log_info!("load", "csv_file_read", path = %path.display(), bytes = len);

        let encoder = ChunkEncoder::new(&bytes, &self.options).map_err(LoadError::Options)?;
        for chunk in encoder {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    log_error!(
                        "load",
                        "csv_parse_failed",
                        path = %path.display(),
                        error = %err,
                    );
                    return Ok(false);
                }
            };
            let rows = chunk.num_rows();
            if rows == 0 {
                continue;
            }
            report.chunks += 1;
            report.rows_submitted += rows as u64;

            let table = Arc::clone(&self.table);
            let rows_loaded = Arc::clone(rows_loaded);
            self.pipeline
                .submit(chunk.memory_size(), move |sink: &mut C::Sink| {
                    log_debug!("load", "chunk_loading", table = %table, rows);
                    match sink.load_chunk(&table, &chunk) {
                        Ok(()) => {
                            rows_loaded.fetch_add(rows as u64, Ordering::Relaxed);
                            JobOutcome::Succeeded
                        }
                        Err(err) => {
                            log_warn!(
                                "load",
                                "chunk_load_failed",
                                table = %table,
                                rows,
                                error = %err,
                            );
                            JobOutcome::Failed(err.to_string())
                        }
                    }
                })?;
        }
        Ok(true)
    }
}
