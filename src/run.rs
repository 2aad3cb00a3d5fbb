//! End-to-end driver: optional CSV load followed by optional query replay.

use std::sync::Arc;

use crate::{
    error::Error,
    load::{CsvLoader, LoadReport},
    observability::log_info,
    option::{Backend, LoaderOptions},
    pipeline::{Pipeline, PipelineStats},
    query::{read_streams, run_streams, QueryReport},
    sink::{Connector, MemoryConnector},
};

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Load phase results, when a load was requested.
    pub load: Option<LoadReport>,
    /// Pipeline counters for the load phase.
    pub load_stats: Option<PipelineStats>,
    /// Query phase results, when a replay was requested.
    pub queries: Option<QueryReport>,
    /// Pipeline counters for the query phase.
    pub query_stats: Option<PipelineStats>,
}

/// Validate `options`, build the configured connector and run.
pub fn run(options: &LoaderOptions) -> Result<RunSummary, Error> {
    options.validate()?;
    match options.backend() {
        #[cfg(feature = "sqlite")]
        Backend::Sqlite { path, busy_timeout } => {
            let connector = crate::sink::SqliteConnector::new(path).busy_timeout(*busy_timeout);
            run_with(options, Arc::new(connector))
        }
        Backend::Memory => run_with(options, Arc::new(MemoryConnector::default())),
    }
}

/// Run against an explicit connector. Each phase gets its own pipeline, and
/// every sink is closed when its phase ends.
pub fn run_with<C: Connector>(
    options: &LoaderOptions,
    connector: Arc<C>,
) -> Result<RunSummary, Error> {
    options.validate()?;
    let mut summary = RunSummary::default();

    if let (Some(csv), Some(table)) = (options.csv(), options.table.as_deref()) {
        log_info!("run", "load_phase", table, path = %csv.path.display());
        let pipeline = Pipeline::new(Arc::clone(&connector), options.pipeline_options())?;
        let report = CsvLoader::new(&pipeline, table, csv.options.clone()).load(&csv.path);
        // Shut down even when the load stopped early so sinks are closed.
        let stats = pipeline.shutdown();
        summary.load = Some(report?);
        summary.load_stats = Some(stats);
    }

    if let Some(request) = options.queries() {
        log_info!("run", "query_phase", path = %request.path.display());
        let streams = read_streams(&request.path)?;
        let pipeline = Pipeline::new(Arc::clone(&connector), options.pipeline_options())?;
        let report = run_streams(&pipeline, streams);
        let stats = pipeline.shutdown();
        let report = report?;
        report.write_result(&request.result_path)?;
        summary.queries = Some(report);
        summary.query_stats = Some(stats);
    }

    Ok(summary)
}
