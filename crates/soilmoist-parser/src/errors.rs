use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file} CSV error: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file} is missing its {row} row")]
    MissingHeader { file: String, row: &'static str },

    #[error("{file} declares column '{column}' more than once")]
    DuplicateColumn { file: String, column: String },

    #[error("{file} data row {line_index} invalid: {message}")]
    DataRow {
        file: String,
        line_index: usize,
        message: String,
    },

    #[error("{file} column layout differs from {reference}: {message}")]
    SchemaMismatch {
        file: String,
        reference: String,
        message: String,
    },

    #[error("{file} has {found} columns, expected {expected}")]
    ColumnCount {
        file: String,
        expected: usize,
        found: usize,
    },

    #[error("no raw files were supplied for this batch")]
    EmptyBatch,

    #[error("{file} does not name a recognised {field}")]
    UnrecognizedFilename { file: String, field: &'static str },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}
