//! Command-line entrypoint: bulk-load CSV files and/or replay query streams.
//!
//! ```text
//! columnload --database tpch.db --table lineitem --threads 8 \
//!     --load-csv data/lineitem:uint32,uint32,float64,string(25),date \
//!     --csv-delimiter '|' --no-csv-header
//! columnload --database tpch.db --threads 8 --run queries/ --results-file result
//! ```

use std::path::PathBuf;
#[cfg(feature = "sqlite")]
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use columnload::{csv::CsvOptions, schema::FieldSchema, Backend, ConfigError, LoaderOptions};
use tracing_subscriber::EnvFilter;

const MIB: usize = 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "columnload", version)]
#[command(about = "Bulk-load CSV data column by column and replay query workloads")]
struct Args {
    /// Database backend the workers connect to.
    #[arg(long, value_enum, default_value = "sqlite")]
    db: Db,
    /// Database file (sqlite backend).
    #[arg(long)]
    database: Option<PathBuf>,
    /// Milliseconds a connection waits on a locked database.
    #[arg(long, default_value_t = 5000)]
    busy_timeout_ms: u64,
    /// Target table for --load-csv.
    #[arg(long)]
    table: Option<String>,
    /// Worker threads.
    #[arg(long, default_value_t = 1)]
    threads: usize,
    /// Memory budget for in-flight work, in MiB.
    #[arg(long, default_value_t = 128)]
    memory: usize,
    /// CSV input and schema, as `<path>:<type>,<type>,...`.
    #[arg(long, value_name = "PATH:SCHEMA")]
    load_csv: Option<String>,
    /// Single-character CSV field delimiter.
    #[arg(long, default_value = ",")]
    csv_delimiter: String,
    /// The CSV files have no header line.
    #[arg(long)]
    no_csv_header: bool,
    /// Per-chunk byte budget, in MiB.
    #[arg(long, default_value_t = 16)]
    chunk_size: usize,
    /// Query file or directory of query files to replay.
    #[arg(long)]
    run: Option<PathBuf>,
    /// File receiving `<succeeded>,<seconds>` after --run.
    #[arg(long, default_value = "result")]
    results_file: PathBuf,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum Db {
    #[cfg(feature = "sqlite")]
    Sqlite,
    Memory,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    let options = build_options(&args)?;
    let summary = columnload::run(&options)?;

    if let Some(load) = &summary.load {
        println!(
            "Finished data loading in {:.3} seconds: {} rows in {} chunks from {} files ({} failed)",
            load.elapsed.as_secs_f64(),
            load.rows_loaded,
            load.chunks,
            load.files,
            load.failed_files,
        );
    }
    if let Some(queries) = &summary.queries {
        println!(
            "Finished {} queries in {} seconds ({} failed)",
            queries.succeeded,
            queries.elapsed.as_secs_f64(),
            queries.failed(),
        );
    }
    Ok(())
}

fn build_options(args: &Args) -> Result<LoaderOptions> {
    let backend = match args.db {
        #[cfg(feature = "sqlite")]
        Db::Sqlite => Backend::Sqlite {
            path: args
                .database
                .clone()
                .context("no database specified, pass --database")?,
            busy_timeout: Duration::from_millis(args.busy_timeout_ms),
        },
        Db::Memory => Backend::Memory,
    };

    let mut options = LoaderOptions::new(backend)
        .threads(args.threads)
        .memory_budget(args.memory.saturating_mul(MIB));
    if let Some(table) = &args.table {
        options = options.table(table);
    }

    if let Some(spec) = &args.load_csv {
        let Some((path, schema)) = spec.rsplit_once(':') else {
            bail!("invalid option '{spec}' for --load-csv, expected <path>:<schema>");
        };
        let fields: FieldSchema = schema
            .parse()
            .with_context(|| format!("invalid schema for --load-csv '{spec}'"))?;
        let csv = CsvOptions::new(fields)
            .delimiter(delimiter(&args.csv_delimiter)?)
            .header(!args.no_csv_header)
            .max_chunk_size(args.chunk_size.saturating_mul(MIB));
        options = options.load_csv(path, csv);
    }

    if let Some(path) = &args.run {
        options = options.run_queries(path, &args.results_file);
    }

    options.validate()?;
    Ok(options)
}

fn delimiter(text: &str) -> Result<u8> {
    match text.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(ConfigError::Invalid(format!(
            "--csv-delimiter must be a single ASCII character, got {text:?}"
        ))
        .into()),
    }
}
