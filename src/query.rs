//! Query stream replay.
//!
//! Every query file becomes one stream: its statements are submitted to the
//! pipeline as a single unit and run in file order on one worker. The report
//! counts statements that succeeded and the wall time until the pipeline
//! drained.

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
    load::list_files,
    observability::{log_debug, log_info, log_warn},
    pipeline::{JobOutcome, Pipeline, PipelineError},
    sink::{Connector, Sink},
};

/// Statements read from one query file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStream {
    /// File the statements came from.
    pub path: PathBuf,
    /// Statements in file order, without their terminators.
    pub statements: Vec<String>,
}

impl QueryStream {
    /// Read and split one query file.
    pub fn read(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        Ok(Self {
            statements: split_statements(&text),
            path,
        })
    }

    fn byte_size(&self) -> usize {
        self.statements.iter().map(String::len).sum()
    }
}

/// Read every query file under `path` (a file or a directory).
pub fn read_streams(path: &Path) -> io::Result<Vec<QueryStream>> {
    list_files(path)?
        .into_iter()
        .map(|file| {
            log_info!("query", "query_file_read", path = %file.display());
            QueryStream::read(file)
        })
        .collect()
}

/// Split a workload script into statements.
///
/// Blank lines and lines starting with `--` are skipped, and `--` outside
/// quotes starts a comment running to the end of the line. Statements end at
/// a `;` outside single or double quotes; the terminator is dropped. Inside
/// quotes a backslash escapes the next character. Trailing text without a
/// terminator is kept as a final statement.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for line in text.split_inclusive('\n') {
        if quote.is_none() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }
        }
        let mut chars = line.chars().peekable();
        while let Some(ch) = chars.next() {
            match quote {
                Some(open) => {
                    current.push(ch);
                    if ch == '\\' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if ch == open {
                        quote = None;
                    }
                }
                None => match ch {
                    ';' => push_statement(&mut statements, &mut current),
                    '-' if chars.peek() == Some(&'-') => {
                        if line.ends_with('\n') {
                            current.push('\n');
                        }
                        break;
                    }
                    '\'' | '"' => {
                        quote = Some(ch);
                        current.push(ch);
                    }
                    _ => current.push(ch),
                },
            }
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Outcome of a replay run.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    /// Streams submitted.
    pub streams: usize,
    /// Statements across all streams.
    pub statements: u64,
    /// Statements that executed without error.
    pub succeeded: u64,
    /// Wall time from first submission until the pipeline drained.
    pub elapsed: Duration,
}

impl QueryReport {
    /// Statements that failed or never ran.
    pub fn failed(&self) -> u64 {
        self.statements - self.succeeded
    }

    /// The `"<succeeded>,<elapsed_seconds>"` result line.
    pub fn result_line(&self) -> String {
        format!("{},{}", self.succeeded, self.elapsed.as_secs_f64())
    }

    /// Write the result line to `path`, replacing any previous content.
    pub fn write_result(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.result_line())
    }
}

/// Submit each stream as one unit of work and wait for all of them.
pub fn run_streams<C: Connector>(
    pipeline: &Pipeline<C>,
    streams: Vec<QueryStream>,
) -> Result<QueryReport, PipelineError> {
    let succeeded = Arc::new(AtomicU64::new(0));
    let statements: u64 = streams.iter().map(|s| s.statements.len() as u64).sum();
    let count = streams.len();
    log_info!(
        "query",
        "query_run_started",
        streams = count,
        statements,
    );

    let start = Instant::now();
    for (index, stream) in streams.into_iter().enumerate() {
        let succeeded = Arc::clone(&succeeded);
        let size = stream.byte_size();
        pipeline.submit(size, move |sink: &mut C::Sink| {
            run_stream(index, &stream, sink, &succeeded)
        })?;
    }
    pipeline.drain();
    let elapsed = start.elapsed();

    let report = QueryReport {
        streams: count,
        statements,
        succeeded: succeeded.load(Ordering::Relaxed),
        elapsed,
    };
    log_info!(
        "query",
        "query_run_finished",
        succeeded = report.succeeded,
        failed = report.failed(),
        elapsed_secs = report.elapsed.as_secs_f64(),
    );
    Ok(report)
}

fn run_stream<S: Sink>(
    index: usize,
    stream: &QueryStream,
    sink: &mut S,
    succeeded: &AtomicU64,
) -> JobOutcome {
    log_debug!("query", "query_stream_started", stream = index);
    let mut failures = 0usize;
    for statement in &stream.statements {
        match sink.execute(statement) {
            Ok(()) => {
                succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                failures += 1;
                log_warn!(
                    "query",
                    "statement_failed",
                    stream = index,
                    error = %err,
                );
            }
        }
    }
    if failures == 0 {
        JobOutcome::Succeeded
    } else {
        JobOutcome::Failed(format!(
            "{failures} of {} statements in {} failed",
            stream.statements.len(),
            stream.path.display()
        ))
    }
}
