use std::io;

use crate::{
    load::LoadError, option::ConfigError, pipeline::PipelineError, schema::SchemaError,
};

/// Error returned by a columnload run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Invalid field schema.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    /// The load phase stopped.
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    /// The worker pool failed.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
    /// Query files or the result file could not be accessed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
