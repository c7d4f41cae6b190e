use std::path::PathBuf;

use soilmoist_parser::ParserError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("merged raw table has no units row")]
    MissingUnits,

    #[error("expected instrumentation columns are absent: {missing:?}")]
    UnknownColumnLayout { missing: Vec<String> },

    #[error("normalized column name '{column}' is produced by more than one raw column")]
    ColumnCollision { column: String },

    #[error("column '{column}' does not split into {expected} underscore-delimited fields (found {found})")]
    GrammarViolation {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("two observations map to wide key {key} for column '{column}'")]
    PivotCollision { key: String, column: String },

    #[error("file discovery failed for pattern '{pattern}': {message}")]
    Discovery { pattern: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
